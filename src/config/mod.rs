//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ConfigSource (table, file, or <instance>/config.toml)
//!     → loader.rs (read & parse into a TOML table)
//!     → merge.rs (deep merge onto schema.rs defaults, report stray keys)
//!     → AllowlistConfig (read-only view, built once at startup)
//! ```
//!
//! # Design Decisions
//! - The merge is permissive: unknown keys are kept, types are not checked
//! - Typed settings fall back to schema defaults when a value has the wrong type
//! - Config is immutable once built

pub mod loader;
pub mod merge;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::{Table, Value};

use crate::observability::logging::{LevelInput, LoggingSettings};

pub use loader::{ConfigError, ConfigSource, ResolvedConfig};
pub use merge::{merge_with_defaults, type_mismatches, warn_unexpected_keys, UnexpectedKey};
pub use schema::default_config;

/// Settings for the proxy reload hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSettings {
    /// Reload after allowlist mutations.
    pub enabled: bool,
    pub command: Vec<String>,
    pub timeout: Duration,
}

/// Settings for the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSettings {
    pub bind_address: String,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub testing: bool,
}

/// The merged application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AllowlistConfig {
    values: Table,
}

impl AllowlistConfig {
    /// Merge `user` onto the default schema.
    pub fn from_user(user: &Table) -> Self {
        Self {
            values: merge_with_defaults(&default_config(), user),
        }
    }

    /// Whether a top-level key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Look up a top-level key that must hold a table.
    pub fn section(&self, key: &str) -> Result<&Table, ConfigError> {
        self.get(key)?
            .as_table()
            .ok_or_else(|| ConfigError::NotATable(key.to_string()))
    }

    pub fn as_table(&self) -> &Table {
        &self.values
    }

    /// Logger name, taken from `app.name`.
    pub fn app_name(&self) -> String {
        self.lookup(schema::APP_SECTION, "name")
            .and_then(Value::as_str)
            .unwrap_or(schema::DEFAULT_APP_NAME)
            .to_string()
    }

    /// Whether `app.strict_config` asks for type checking.
    pub fn strict(&self) -> bool {
        self.lookup(schema::APP_SECTION, "strict_config")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Logging settings. A relative `logging.path` is resolved against
    /// `instance_path`; an empty one means console only.
    pub fn logging_settings(&self, instance_path: &Path) -> LoggingSettings {
        let level = self
            .lookup(schema::LOGGING_SECTION, "level")
            .map(LevelInput::from)
            .unwrap_or_else(|| LevelInput::from(schema::DEFAULT_LOG_LEVEL));

        let path = self
            .lookup(schema::LOGGING_SECTION, "path")
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(|path| {
                let path = PathBuf::from(path);
                if path.is_absolute() {
                    path
                } else {
                    instance_path.join(path)
                }
            });

        LoggingSettings {
            level,
            path,
            console: true,
        }
    }

    pub fn reload_settings(&self) -> ReloadSettings {
        let enabled = self
            .lookup(schema::APP_SECTION, "nginx_reload")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let command = self
            .lookup(schema::APP_SECTION, "nginx_reload_command")
            .and_then(Value::as_array)
            .and_then(|parts| {
                parts
                    .iter()
                    .map(|part| part.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .unwrap_or_else(schema::default_reload_command);

        let timeout_secs = self
            .lookup(schema::APP_SECTION, "nginx_reload_timeout_secs")
            .and_then(Value::as_integer)
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(schema::DEFAULT_RELOAD_TIMEOUT_SECS);

        ReloadSettings {
            enabled,
            command,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn web_settings(&self) -> WebSettings {
        let bind_address = self
            .lookup(schema::WEB_SECTION, "bind_address")
            .and_then(Value::as_str)
            .unwrap_or(schema::DEFAULT_BIND_ADDRESS)
            .to_string();

        let request_timeout_secs = self
            .lookup(schema::WEB_SECTION, "request_timeout_secs")
            .and_then(Value::as_integer)
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(schema::DEFAULT_REQUEST_TIMEOUT_SECS);

        let max_body_bytes = self
            .lookup(schema::WEB_SECTION, "max_body_bytes")
            .and_then(Value::as_integer)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .unwrap_or(schema::DEFAULT_MAX_BODY_BYTES as usize);

        let testing = self
            .lookup(schema::WEB_SECTION, "testing")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        WebSettings {
            bind_address,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_body_bytes,
            testing,
        }
    }

    fn lookup(&self, section: &str, key: &str) -> Option<&Value> {
        self.values.get(section)?.as_table()?.get(key)
    }
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            values: default_config(),
        }
    }
}

impl fmt::Display for AllowlistConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match toml::to_string_pretty(&self.values) {
            Ok(rendered) => f.write_str(&rendered),
            Err(_) => write!(f, "{:?}", self.values),
        }
    }
}
