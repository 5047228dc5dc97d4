//! Allowlist records.
//!
//! The store only persists opaque entries; what an entry means is up to the
//! proxy configuration that consumes the file.

pub mod store;

pub use store::{AllowlistStore, StoreError, STORE_FILE_NAME};
