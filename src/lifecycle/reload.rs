//! Reverse-proxy reload hook.
//!
//! # Responsibilities
//! - Run the configured reload command after allowlist changes
//! - Bound the call with a timeout
//! - Absorb every failure: log a fixed line and hand control back
//!
//! # Design Decisions
//! - The underlying cause is kept in [`ReloadOutcome::Failed`] and logged as
//!   a field, the message itself stays fixed
//! - A timed out child is killed when its handle is dropped

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::config::ReloadSettings;

/// Log line emitted for every failed reload.
pub const RELOAD_FAILED_MESSAGE: &str = "Couldn't restart nginx";

/// Why a reload failed.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("reload command is empty")]
    EmptyCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Result of a reload attempt. Consumed only for logging and responses.
#[derive(Debug)]
pub enum ReloadOutcome {
    Reloaded,
    Failed(ReloadError),
}

impl ReloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReloadOutcome::Reloaded)
    }
}

/// Invokes the reverse-proxy reload command.
#[derive(Debug, Clone)]
pub struct ProxyReloader {
    command: Vec<String>,
    timeout: Duration,
}

impl ProxyReloader {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_settings(settings: &ReloadSettings) -> Self {
        Self::new(settings.command.clone(), settings.timeout)
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Reload the proxy. Never returns an error; failures are logged.
    pub async fn reload(&self) -> ReloadOutcome {
        match self.run().await {
            Ok(()) => {
                tracing::info!(command = ?self.command, "Reloaded nginx");
                ReloadOutcome::Reloaded
            }
            Err(e) => {
                tracing::error!(command = ?self.command, cause = %e, "{}", RELOAD_FAILED_MESSAGE);
                ReloadOutcome::Failed(e)
            }
        }
    }

    async fn run(&self) -> Result<(), ReloadError> {
        let (program, args) = self.command.split_first().ok_or(ReloadError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ReloadError::Spawn {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ReloadError::TimedOut {
                    program: program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(ReloadError::ExitStatus {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
