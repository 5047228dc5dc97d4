//! Default configuration schema.
//!
//! The schema is kept as a plain TOML table rather than a serde struct so that
//! the merge can carry keys it does not know about through to the final
//! configuration.

use toml::{Table, Value};

/// Section holding application settings.
pub const APP_SECTION: &str = "app";
/// Section holding logging settings.
pub const LOGGING_SECTION: &str = "logging";
/// Section holding web framework integration settings.
pub const WEB_SECTION: &str = "web";

/// Logger name used when `app.name` is missing.
pub const DEFAULT_APP_NAME: &str = "allowlistapp";
/// Level used when `logging.level` is missing or unrecognized.
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

/// Default reload invocation.
pub fn default_reload_command() -> Vec<String> {
    vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()]
}

/// Build the default configuration schema.
///
/// ```text
/// [app]       name, nginx_reload, nginx_reload_command,
///             nginx_reload_timeout_secs, strict_config
/// [logging]   level, path
/// [web]       bind_address, request_timeout_secs, max_body_bytes, testing
/// ```
pub fn default_config() -> Table {
    let mut app = Table::new();
    app.insert("name".into(), Value::String(DEFAULT_APP_NAME.into()));
    app.insert("nginx_reload".into(), Value::Boolean(false));
    app.insert(
        "nginx_reload_command".into(),
        Value::Array(default_reload_command().into_iter().map(Value::String).collect()),
    );
    app.insert(
        "nginx_reload_timeout_secs".into(),
        Value::Integer(DEFAULT_RELOAD_TIMEOUT_SECS as i64),
    );
    app.insert("strict_config".into(), Value::Boolean(false));

    let mut logging = Table::new();
    logging.insert("level".into(), Value::String(DEFAULT_LOG_LEVEL.into()));
    // Empty path: console only.
    logging.insert("path".into(), Value::String(String::new()));

    let mut web = Table::new();
    web.insert("bind_address".into(), Value::String(DEFAULT_BIND_ADDRESS.into()));
    web.insert(
        "request_timeout_secs".into(),
        Value::Integer(DEFAULT_REQUEST_TIMEOUT_SECS as i64),
    );
    web.insert("max_body_bytes".into(), Value::Integer(DEFAULT_MAX_BODY_BYTES as i64));
    web.insert("testing".into(), Value::Boolean(false));

    let mut root = Table::new();
    root.insert(APP_SECTION.into(), Value::Table(app));
    root.insert(LOGGING_SECTION.into(), Value::Table(logging));
    root.insert(WEB_SECTION.into(), Value::Table(web));
    root
}
