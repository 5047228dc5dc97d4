//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::{Table, Value};

use crate::config::schema::default_config;

/// File name of the configuration inside an instance directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for configuration loading and lookup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to render configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config entry {0} is not a table")]
    NotATable(String),

    #[error("Config key {0} not found")]
    KeyNotFound(String),
}

/// Where the user configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// An already parsed table.
    Table(Table),
    /// A TOML file at an explicit path.
    File(PathBuf),
    /// `config.toml` inside the instance directory, created with defaults
    /// when missing.
    Instance,
}

impl From<Table> for ConfigSource {
    fn from(table: Table) -> Self {
        ConfigSource::Table(table)
    }
}

/// A resolved user table, plus the defaults file written while resolving.
///
/// Resolution happens before any log sink exists, so it records what it did
/// and [`ResolvedConfig::report`] logs it once the logger is configured.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub table: Table,
    pub written_defaults: Option<PathBuf>,
}

impl ResolvedConfig {
    fn loaded(table: Table) -> Self {
        Self {
            table,
            written_defaults: None,
        }
    }

    /// Log deferred resolution events.
    pub fn report(&self) {
        if let Some(path) = &self.written_defaults {
            tracing::info!(path = %path.display(), "Wrote default configuration");
        }
    }
}

impl ConfigSource {
    /// Produce the raw user table for this source. Does not log.
    pub fn resolve(&self, instance_path: &Path) -> Result<ResolvedConfig, ConfigError> {
        match self {
            ConfigSource::Table(table) => Ok(ResolvedConfig::loaded(table.clone())),
            ConfigSource::File(path) => load_table(path).map(ResolvedConfig::loaded),
            ConfigSource::Instance => {
                let path = instance_path.join(CONFIG_FILE_NAME);
                if path.exists() {
                    return load_table(&path).map(ResolvedConfig::loaded);
                }
                fs::create_dir_all(instance_path).map_err(|source| ConfigError::Io {
                    path: instance_path.to_path_buf(),
                    source,
                })?;
                write_default_config(&path)?;
                Ok(ResolvedConfig {
                    table: Table::new(),
                    written_defaults: Some(path),
                })
            }
        }
    }
}

/// Load a TOML document as a table.
pub fn load_table(path: &Path) -> Result<Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a TOML document as a table.
pub fn parse_table(content: &str) -> Result<Table, toml::de::Error> {
    content.parse::<Table>()
}

/// Write the default schema to `path` as pretty TOML.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(&Value::Table(default_config()))?;
    fs::write(path, rendered).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
