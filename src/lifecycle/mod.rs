//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Merge → Configure logger → Open store → Build router
//!
//! Reload (reload.rs):
//!     Allowlist changed → Run proxy reload command → Log failure, carry on
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger → Stop accepting → Drain connections → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then everything that logs
//! - Reload failures never propagate to the request that caused them

pub mod reload;
pub mod shutdown;
pub mod startup;

pub use reload::{ProxyReloader, ReloadError, ReloadOutcome, RELOAD_FAILED_MESSAGE};
pub use shutdown::Shutdown;
pub use startup::{create_app, AllowlistApp, StartupError};
