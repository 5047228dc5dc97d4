//! HTTP surface for managing the allowlist.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, trace, timeout, body limit)
//!     → handlers.rs (list / add / remove entries)
//!     → allowlist store, then proxy reload on change
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, serve, AppState};
