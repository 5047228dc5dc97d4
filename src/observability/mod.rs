//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems emit tracing events
//!     → logging.rs (named logger: level gate)
//!     → sinks (console, append-mode file, in-memory capture)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event
//! - Loggers live in a registry keyed by name so re-initialization replaces
//!   sinks instead of stacking them

pub mod logging;

pub use logging::{resolve_level, LevelInput, LogCapture, Logger, LoggerRegistry, LoggingError, LoggingSettings};
