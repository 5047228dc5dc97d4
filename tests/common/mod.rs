//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use allowlist_manager::observability::logging::{self, LogCapture};
use allowlist_manager::{AllowlistApp, Shutdown};
use tokio::net::TcpListener;
use tracing::subscriber::DefaultGuard;

/// Load `tests/configs/<name>.toml`, substituting `{{TEST_LOG_PATH}}`.
#[allow(dead_code)]
pub fn test_config(name: &str, log_path: &Path) -> toml::Table {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("configs")
        .join(format!("{}.toml", name));
    let template = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("No config could be loaded for {}: {}", name, e));
    let rendered = template.replace("{{TEST_LOG_PATH}}", &log_path.display().to_string());
    rendered.parse().unwrap()
}

/// Give the config a logger name of its own so tests don't share sinks.
#[allow(dead_code)]
pub fn with_app_name(mut config: toml::Table, name: &str) -> toml::Table {
    let app = config
        .entry("app")
        .or_insert(toml::Value::Table(toml::Table::new()));
    app.as_table_mut()
        .unwrap()
        .insert("name".into(), toml::Value::String(name.into()));
    config
}

/// Capture everything the named logger writes on this thread.
///
/// Must be called before `create_app` to see startup diagnostics.
#[allow(dead_code)]
pub fn capture_logger(name: &str) -> (LogCapture, DefaultGuard) {
    let logger = logging::registry().get_or_create(name);
    let capture = logger.capture();
    let guard = logger.set_thread_default();
    (capture, guard)
}

/// Serve `app` on an ephemeral port.
#[allow(dead_code)]
pub async fn start_app(app: AllowlistApp) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = app.serve(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
