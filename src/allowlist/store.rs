//! Flat-file allowlist storage.
//!
//! One entry per line. Additions append, removals rewrite the whole file.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File name of the store inside an instance directory.
pub const STORE_FILE_NAME: &str = "database.csv";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("allowlist store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid allowlist entry {0:?}")]
    InvalidEntry(String),
}

/// Allowlist entries persisted to a single file.
#[derive(Debug)]
pub struct AllowlistStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl AllowlistStore {
    /// Open the store at `path`, creating an empty file if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let _held = self.lock.lock().await;
        self.read_entries().await
    }

    /// Append `entry`. Returns `false` if it was already present.
    pub async fn add(&self, entry: &str) -> Result<bool, StoreError> {
        let entry = normalize_entry(entry)?;
        let _held = self.lock.lock().await;

        if self.read_entries().await?.iter().any(|existing| *existing == entry) {
            return Ok(false);
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.write_all(format!("{}\n", entry).as_bytes())
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.flush().await.map_err(|source| io_error(&self.path, source))?;
        Ok(true)
    }

    /// Remove `entry`. Returns `false` if it was not present.
    pub async fn remove(&self, entry: &str) -> Result<bool, StoreError> {
        let entry = normalize_entry(entry)?;
        let _held = self.lock.lock().await;

        let entries = self.read_entries().await?;
        let kept: Vec<&String> = entries.iter().filter(|existing| **existing != entry).collect();
        if kept.len() == entries.len() {
            return Ok(false);
        }

        let mut content = String::new();
        for existing in kept {
            content.push_str(existing);
            content.push('\n');
        }
        fs::write(&self.path, content)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        Ok(true)
    }

    async fn read_entries(&self) -> Result<Vec<String>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(io_error(&self.path, source)),
        };
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Trim an entry and reject anything that would break the line format.
pub fn normalize_entry(entry: &str) -> Result<String, StoreError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() || trimmed.contains([',', '"', '\n', '\r']) {
        return Err(StoreError::InvalidEntry(entry.to_string()));
    }
    Ok(trimmed.to_string())
}
