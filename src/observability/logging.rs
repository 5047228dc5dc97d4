//! Named loggers backed by `tracing`.
//!
//! # Responsibilities
//! - Resolve numeric or named log levels
//! - Attach console, file and capture sinks to a named logger
//! - Re-initialize a logger without leaking file descriptors
//!
//! # Design Decisions
//! - A logger is exposed to `tracing` as a `fmt` layer whose writer fans out
//!   to the logger's sinks and whose filter reads the logger's level
//! - File sink errors are returned untouched so startup can abort
//! - The sink lock is never held while emitting events

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use dashmap::DashMap;
use thiserror::Error;
use tracing::subscriber::DefaultGuard;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const CRITICAL: u32 = 50;
pub const ERROR: u32 = 40;
pub const WARNING: u32 = 30;
pub const INFO: u32 = 20;
pub const DEBUG: u32 = 10;
pub const TRACE: u32 = 5;
pub const NOTSET: u32 = 0;

/// Level used for unrecognized level names.
pub const DEFAULT_LEVEL: u32 = INFO;

/// Errors raised while attaching sinks.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("permission denied opening log file {}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("log file target {} is a directory", path.display())]
    IsADirectory { path: PathBuf },

    #[error("failed to open log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A requested log level, as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelInput {
    Numeric(u32),
    Named(String),
}

impl From<u32> for LevelInput {
    fn from(level: u32) -> Self {
        LevelInput::Numeric(level)
    }
}

impl From<&str> for LevelInput {
    fn from(name: &str) -> Self {
        LevelInput::Named(name.to_string())
    }
}

impl From<String> for LevelInput {
    fn from(name: String) -> Self {
        LevelInput::Named(name)
    }
}

impl From<&toml::Value> for LevelInput {
    fn from(value: &toml::Value) -> Self {
        match value {
            toml::Value::Integer(n) => match u32::try_from(*n) {
                Ok(n) => LevelInput::Numeric(n),
                Err(_) => LevelInput::Named(n.to_string()),
            },
            toml::Value::String(s) => LevelInput::Named(s.clone()),
            other => LevelInput::Named(other.to_string()),
        }
    }
}

impl std::fmt::Display for LevelInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelInput::Numeric(n) => write!(f, "{}", n),
            LevelInput::Named(s) => write!(f, "{}", s),
        }
    }
}

fn level_by_name(name: &str) -> Option<u32> {
    let level = match name.trim().to_ascii_uppercase().as_str() {
        "CRITICAL" | "FATAL" => CRITICAL,
        "ERROR" => ERROR,
        "WARNING" | "WARN" => WARNING,
        "INFO" => INFO,
        "DEBUG" => DEBUG,
        "TRACE" => TRACE,
        "NOTSET" => NOTSET,
        _ => return None,
    };
    Some(level)
}

/// Resolve a requested level to its numeric value.
///
/// Numbers pass through. Unknown names fall back to [`DEFAULT_LEVEL`] with a
/// warning; this never fails.
pub fn resolve_level(input: impl Into<LevelInput>) -> u32 {
    let input = input.into();
    level_of(&input).unwrap_or_else(|| {
        warn_invalid_level(&input);
        DEFAULT_LEVEL
    })
}

fn level_of(input: &LevelInput) -> Option<u32> {
    match input {
        LevelInput::Numeric(n) => Some(*n),
        LevelInput::Named(name) => level_by_name(name),
    }
}

fn warn_invalid_level(input: &LevelInput) {
    tracing::warn!(level = %input, "Invalid log level {}, defaulting to INFO", input);
}

/// Numeric value of a `tracing` level.
pub fn level_value(level: &Level) -> u32 {
    match *level {
        Level::ERROR => ERROR,
        Level::WARN => WARNING,
        Level::INFO => INFO,
        Level::DEBUG => DEBUG,
        Level::TRACE => TRACE,
    }
}

/// In-memory sink contents, shared with whoever holds the handle.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    fn append(&self, bytes: &[u8]) {
        lock(&self.buffer).extend_from_slice(bytes);
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buffer)).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }

    pub fn clear(&self) {
        lock(&self.buffer).clear();
    }
}

#[derive(Debug)]
enum Sink {
    Console,
    File { path: PathBuf, file: File },
    Capture(LogCapture),
}

impl Sink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Console => io::stderr().write_all(bytes),
            Sink::File { file, .. } => file.write_all(bytes),
            Sink::Capture(capture) => {
                capture.append(bytes);
                Ok(())
            }
        }
    }
}

/// Lifecycle of a named logger.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Uninitialized = 0,
    Configured = 1,
    Reconfigured = 2,
}

impl From<u8> for LoggerState {
    fn from(val: u8) -> Self {
        match val {
            1 => LoggerState::Configured,
            2 => LoggerState::Reconfigured,
            _ => LoggerState::Uninitialized,
        }
    }
}

/// Settings applied by [`Logger::configure`].
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelInput,
    /// Append-mode log file, if any.
    pub path: Option<PathBuf>,
    pub console: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LevelInput::Numeric(DEFAULT_LEVEL),
            path: None,
            console: true,
        }
    }
}

/// A named logger: a level plus a set of sinks.
#[derive(Debug)]
pub struct Logger {
    name: String,
    level: AtomicU32,
    state: AtomicU8,
    sinks: Mutex<Vec<Sink>>,
}

impl Logger {
    /// Create an unregistered logger with no sinks.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            level: AtomicU32::new(DEFAULT_LEVEL),
            state: AtomicU8::new(LoggerState::Uninitialized as u8),
            sinks: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> LoggerState {
        LoggerState::from(self.state.load(Ordering::Relaxed))
    }

    /// Resolve `input` and make it the effective level. Returns the level applied.
    pub fn set_level(&self, input: impl Into<LevelInput>) -> u32 {
        let level = resolve_level(input);
        self.level.store(level, Ordering::Relaxed);
        level
    }

    /// Whether records at `level` pass this logger's threshold.
    pub fn enabled(&self, level: &Level) -> bool {
        level_value(level) >= self.level()
    }

    pub fn sink_count(&self) -> usize {
        self.lock_sinks().len()
    }

    /// Paths of the attached file sinks.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.lock_sinks()
            .iter()
            .filter_map(|sink| match sink {
                Sink::File { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn add_console_sink(&self) {
        self.lock_sinks().push(Sink::Console);
    }

    /// Open `path` for append and write subsequent records to it.
    pub fn add_file_sink(&self, path: impl AsRef<Path>) -> Result<(), LoggingError> {
        let path = path.as_ref();
        let file = open_append(path)?;
        self.lock_sinks().push(Sink::File {
            path: path.to_path_buf(),
            file,
        });
        Ok(())
    }

    /// Attach an in-memory sink and return a handle to its contents.
    ///
    /// Capture sinks survive [`Logger::configure`], so they can observe startup.
    pub fn capture(&self) -> LogCapture {
        let capture = LogCapture::default();
        self.lock_sinks().push(Sink::Capture(capture.clone()));
        capture
    }

    /// Detach every sink. Dropping a file sink closes its descriptor.
    pub fn clear_sinks(&self) {
        self.lock_sinks().clear();
    }

    /// Apply `settings`, replacing any console and file sinks from a
    /// previous configuration.
    ///
    /// The file is opened before anything changes, so a failure leaves the
    /// logger as it was. The level is resolved after the new sinks are in
    /// place so a fallback warning reaches them.
    pub fn configure(&self, settings: &LoggingSettings) -> Result<(), LoggingError> {
        let file = match &settings.path {
            Some(path) => Some(Sink::File {
                path: path.clone(),
                file: open_append(path)?,
            }),
            None => None,
        };

        let previous = {
            let mut sinks = self.lock_sinks();
            sinks.retain(|sink| matches!(sink, Sink::Capture(_)));
            if settings.console {
                sinks.push(Sink::Console);
            }
            sinks.extend(file);
            LoggerState::from(self.state.load(Ordering::Relaxed))
        };

        let level = match level_of(&settings.level) {
            Some(level) => {
                self.level.store(level, Ordering::Relaxed);
                level
            }
            None => {
                self.level.store(DEFAULT_LEVEL, Ordering::Relaxed);
                warn_invalid_level(&settings.level);
                DEFAULT_LEVEL
            }
        };

        let next = match previous {
            LoggerState::Uninitialized => LoggerState::Configured,
            _ => LoggerState::Reconfigured,
        };
        self.state.store(next as u8, Ordering::Relaxed);

        tracing::debug!(
            logger = %self.name,
            level,
            file = ?settings.path,
            "Logger configured"
        );
        Ok(())
    }

    /// A `tracing` layer that routes records to this logger's sinks.
    pub fn layer<S>(self: &Arc<Self>) -> impl Layer<S> + Send + Sync
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let gate = Arc::clone(self);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(LoggerWriter(Arc::clone(self)))
            .with_filter(filter_fn(move |meta| gate.enabled(meta.level())))
    }

    /// Route events on the current thread to this logger until the guard drops.
    pub fn set_thread_default(self: &Arc<Self>) -> DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.layer::<Registry>()))
    }

    /// Install this logger as the process-wide subscriber.
    pub fn install_global(self: &Arc<Self>, env_filter: Option<EnvFilter>) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(self.layer::<Layered<Option<EnvFilter>, Registry>>())
            .try_init()
    }

    fn write_record(&self, bytes: &[u8]) {
        for sink in self.lock_sinks().iter_mut() {
            // A broken sink must not take the others down.
            let _ = sink.write(bytes);
        }
    }

    fn lock_sinks(&self) -> MutexGuard<'_, Vec<Sink>> {
        lock(&self.sinks)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn open_append(path: &Path) -> Result<File, LoggingError> {
    if path.is_dir() {
        return Err(LoggingError::IsADirectory {
            path: path.to_path_buf(),
        });
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| classify_open_error(path, source))
}

fn classify_open_error(path: &Path, source: io::Error) -> LoggingError {
    let path = path.to_path_buf();
    match source.kind() {
        io::ErrorKind::PermissionDenied => LoggingError::PermissionDenied { path, source },
        _ if path.is_dir() => LoggingError::IsADirectory { path },
        _ => LoggingError::Io { path, source },
    }
}

#[derive(Clone)]
struct LoggerWriter(Arc<Logger>);

impl<'a> MakeWriter<'a> for LoggerWriter {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { logger: &self.0 }
    }
}

struct SinkWriter<'a> {
    logger: &'a Logger,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logger.write_record(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Process-wide loggers, keyed by name.
#[derive(Debug, Default)]
pub struct LoggerRegistry {
    loggers: DashMap<String, Arc<Logger>>,
}

impl LoggerRegistry {
    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Logger> {
        Arc::clone(
            self.loggers
                .entry(name.to_string())
                .or_insert_with(|| Logger::new(name))
                .value(),
        )
    }

    /// Configure (or reconfigure) the logger called `name`.
    pub fn configure(&self, name: &str, settings: &LoggingSettings) -> Result<Arc<Logger>, LoggingError> {
        let logger = self.get_or_create(name);
        logger.configure(settings)?;
        Ok(logger)
    }
}

/// The process-wide logger registry.
pub fn registry() -> &'static LoggerRegistry {
    static REGISTRY: OnceLock<LoggerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(LoggerRegistry::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level_table() {
        assert_eq!(resolve_level(50u32), 50);
        assert_eq!(resolve_level("INFO"), 20);
        assert_eq!(resolve_level("WARNING"), 30);
        assert_eq!(resolve_level("warn"), 30);
        assert_eq!(resolve_level("CRITICAL"), 50);
        assert_eq!(resolve_level("INVALID"), 20);
    }

    #[test]
    fn test_invalid_level_is_reported() {
        let logger = Logger::new("test-invalid-level");
        let capture = logger.capture();
        let level = {
            let _guard = logger.set_thread_default();
            resolve_level("INVALID")
        };
        assert_eq!(level, DEFAULT_LEVEL);
        assert!(capture.contains("Invalid log level INVALID, defaulting to INFO"));
    }

    #[test]
    fn test_level_from_toml() {
        assert_eq!(LevelInput::from(&toml::Value::Integer(40)), LevelInput::Numeric(40));
        assert_eq!(resolve_level(&toml::Value::Integer(-1)), DEFAULT_LEVEL);
        assert_eq!(resolve_level(&toml::Value::String("DEBUG".into())), DEBUG);
        assert_eq!(resolve_level(&toml::Value::Boolean(true)), DEFAULT_LEVEL);
    }

    #[test]
    fn test_set_level_last_request_wins() {
        let logger = Logger::new("test-set-level");
        for (input, expected) in [
            (LevelInput::from(50u32), 50),
            (LevelInput::from("INFO"), 20),
            (LevelInput::from("WARNING"), 30),
            (LevelInput::from("INVALID"), 20),
        ] {
            logger.set_level(input);
            assert_eq!(logger.level(), expected);
        }
    }

    #[test]
    fn test_level_gates_records() {
        let logger = Logger::new("test-level-gate");
        let capture = logger.capture();
        logger.set_level("WARNING");
        {
            let _guard = logger.set_thread_default();
            tracing::info!("quiet info line");
            tracing::warn!("loud warning line");
        }
        let text = capture.contents();
        assert!(!text.contains("quiet info line"));
        assert!(text.contains("loud warning line"));
    }

    #[test]
    fn test_file_sink_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new("test-dir-sink");

        let err = logger.add_file_sink(dir.path()).unwrap_err();
        assert!(matches!(err, LoggingError::IsADirectory { .. }));
        assert_eq!(logger.sink_count(), 0);
    }

    #[test]
    fn test_permission_error_is_classified() {
        let path = Path::new("/nonexistent/test.log");
        let err = classify_open_error(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, LoggingError::PermissionDenied { .. }));

        let err = classify_open_error(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, LoggingError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_sink_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.log");
        std::fs::write(&path, b"").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();

        // Privileged users bypass file modes; nothing to check then.
        if OpenOptions::new().append(true).open(&path).is_ok() {
            return;
        }

        let logger = Logger::new("test-readonly-sink");
        let err = logger.add_file_sink(&path).unwrap_err();
        assert!(matches!(err, LoggingError::PermissionDenied { .. }));
    }

    #[test]
    fn test_file_sink_receives_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.log");
        let logger = Logger::new("test-file-sink");
        logger.add_file_sink(&path).unwrap();

        {
            let _guard = logger.set_thread_default();
            tracing::info!(entry = "10.0.0.1", "written to file");
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("written to file"));
        assert!(text.contains("entry=\"10.0.0.1\""));
    }

    #[test]
    fn test_reconfigure_replaces_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let logger = Logger::new("test-reconfigure");
        let capture = logger.capture();
        assert_eq!(logger.state(), LoggerState::Uninitialized);

        let settings = LoggingSettings {
            level: "DEBUG".into(),
            path: Some(first.clone()),
            console: false,
        };
        logger.configure(&settings).unwrap();
        assert_eq!(logger.state(), LoggerState::Configured);
        assert_eq!(logger.level(), DEBUG);

        let settings = LoggingSettings {
            level: "ERROR".into(),
            path: Some(second.clone()),
            console: false,
        };
        logger.configure(&settings).unwrap();
        assert_eq!(logger.state(), LoggerState::Reconfigured);
        assert_eq!(logger.level(), ERROR);
        assert_eq!(logger.file_paths(), vec![second.clone()]);
        // capture + second file
        assert_eq!(logger.sink_count(), 2);

        {
            let _guard = logger.set_thread_default();
            tracing::error!("after reconfigure");
        }
        assert!(!std::fs::read_to_string(&first).unwrap().contains("after reconfigure"));
        assert!(std::fs::read_to_string(&second).unwrap().contains("after reconfigure"));
        assert!(capture.contains("after reconfigure"));
    }

    #[test]
    fn test_invalid_level_reaches_new_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid-level.log");
        let logger = Logger::new("test-invalid-level-file");
        let _guard = logger.set_thread_default();

        let settings = LoggingSettings {
            level: "INVALID".into(),
            path: Some(path.clone()),
            console: false,
        };
        logger.configure(&settings).unwrap();

        assert_eq!(logger.level(), DEFAULT_LEVEL);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Invalid log level INVALID, defaulting to INFO"));
    }

    #[test]
    fn test_failed_reconfigure_leaves_logger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.log");
        let logger = Logger::new("test-failed-reconfigure");
        let settings = LoggingSettings {
            level: "ERROR".into(),
            path: Some(path.clone()),
            console: false,
        };
        logger.configure(&settings).unwrap();

        let broken = LoggingSettings {
            level: "DEBUG".into(),
            path: Some(dir.path().to_path_buf()),
            console: true,
        };
        let err = logger.configure(&broken).unwrap_err();

        assert!(matches!(err, LoggingError::IsADirectory { .. }));
        assert_eq!(logger.level(), ERROR);
        assert_eq!(logger.state(), LoggerState::Configured);
        assert_eq!(logger.file_paths(), vec![path]);
        assert_eq!(logger.sink_count(), 1);
    }

    #[test]
    fn test_repeated_configure_does_not_accumulate_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repeat.log");
        let logger = Logger::new("test-repeat");
        let settings = LoggingSettings {
            level: INFO.into(),
            path: Some(path),
            console: true,
        };
        for _ in 0..5 {
            logger.configure(&settings).unwrap();
        }
        assert_eq!(logger.sink_count(), 2);
        assert_eq!(logger.file_paths().len(), 1);
    }

    #[test]
    fn test_registry_returns_same_logger() {
        let a = registry().get_or_create("test-registry-shared");
        let b = registry().get_or_create("test-registry-shared");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry().get("test-registry-missing").is_none());
    }

    #[test]
    fn test_registry_configure_propagates_sink_errors() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            level: INFO.into(),
            path: Some(dir.path().to_path_buf()),
            console: false,
        };
        let err = registry().configure("test-registry-dir", &settings).unwrap_err();
        assert!(matches!(err, LoggingError::IsADirectory { .. }));
    }
}
