//! Allowlist manager fronted by a reverse proxy.
//!
//! Entries are edited over a small HTTP API; every change triggers a proxy
//! reload whose failure is logged but never fails the change itself.

pub mod allowlist;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AllowlistConfig;
pub use lifecycle::{create_app, AllowlistApp, Shutdown};
