//! Application construction: config merge, logging bootstrap, startup reload.

use allowlist_manager::config::loader::CONFIG_FILE_NAME;
use allowlist_manager::config::{default_config, merge_with_defaults, AllowlistConfig, ConfigSource};
use allowlist_manager::lifecycle::{StartupError, RELOAD_FAILED_MESSAGE};
use allowlist_manager::observability::logging::{self, LoggerState, LoggingError, DEBUG};
use allowlist_manager::create_app;

mod common;

#[test]
fn test_config_merge_keeps_schema_shape() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("test.log");

    let test_configs = [
        toml::Table::new(),
        common::test_config("logging_path_valid", &log_path),
        common::test_config("testing_true_valid", &log_path),
    ];

    for user in &test_configs {
        let merged = merge_with_defaults(&default_config(), user);
        assert!(merged["app"].is_table());
        assert!(merged["logging"].is_table());
        assert!(merged["logging"]["path"].is_str());
        assert!(merged["logging"]["level"].is_str());
        assert!(merged["web"].is_table());
    }

    let merged = merge_with_defaults(&default_config(), &"TEST_CONFIG_ENTRY_NOT_IN_SCHEMA = \"lmao\"".parse().unwrap());
    assert_eq!(merged["TEST_CONFIG_ENTRY_NOT_IN_SCHEMA"].as_str(), Some("lmao"));
}

#[tokio::test]
async fn test_create_app_writes_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let instance = dir.path().join("instance");

    let (capture, _guard) = common::capture_logger("allowlistapp");
    let app = create_app(ConfigSource::Instance, &instance).await.unwrap();

    assert!(instance.join(CONFIG_FILE_NAME).is_file());
    assert!(capture.contains("Wrote default configuration"));
    assert_eq!(app.config(), &AllowlistConfig::default());
    assert!(app.state().reloader.is_none());
}

#[tokio::test]
async fn test_create_app_logs_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("test.log");
    let config = common::with_app_name(
        common::test_config("logging_path_valid", &log_path),
        "startup-file-log",
    );

    let (_capture, _guard) = common::capture_logger("startup-file-log");
    let app = create_app(config, dir.path()).await.unwrap();

    assert_eq!(app.logger().level(), DEBUG);
    assert_eq!(app.logger().file_paths(), vec![log_path.clone()]);

    tracing::info!("record after startup");
    let text = std::fs::read_to_string(&log_path).unwrap();
    assert!(text.contains("Application created"));
    assert!(text.contains("record after startup"));
}

#[tokio::test]
async fn test_create_app_twice_reconfigures_logger() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("test.log");
    let config = common::with_app_name(
        common::test_config("logging_path_valid", &log_path),
        "startup-reconfigure",
    );

    create_app(config.clone(), dir.path()).await.unwrap();
    let app = create_app(config, dir.path()).await.unwrap();

    assert_eq!(app.logger().state(), LoggerState::Reconfigured);
    // console + one file, not two of each
    assert_eq!(app.logger().sink_count(), 2);
}

#[tokio::test]
async fn test_create_app_log_path_is_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::with_app_name(
        common::test_config("logging_path_valid", dir.path()),
        "startup-log-dir",
    );

    let err = create_app(config, dir.path()).await.err().unwrap();
    assert!(matches!(err, StartupError::Logging(LoggingError::IsADirectory { .. })));
}

#[tokio::test]
async fn test_unexpected_keys_logged_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config: toml::Table = r#"
        TEST_CONFIG_ROOT_ENTRY_NOT_IN_SCHEMA = ""
        [app]
        name = "startup-unexpected"
        TEST_CONFIG_APP_ENTRY_NOT_IN_SCHEMA = ""
    "#
    .parse()
    .unwrap();

    let (capture, _guard) = common::capture_logger("startup-unexpected");
    let app = create_app(config, dir.path()).await.unwrap();

    assert!(capture.contains("Config entry key <root>[TEST_CONFIG_ROOT_ENTRY_NOT_IN_SCHEMA] not in schema"));
    assert!(capture.contains("Config entry key [app][TEST_CONFIG_APP_ENTRY_NOT_IN_SCHEMA] not in schema"));
    // Still kept in the merged config.
    assert!(app.config().contains("TEST_CONFIG_ROOT_ENTRY_NOT_IN_SCHEMA"));
}

#[tokio::test]
async fn test_strict_config_reports_type_mismatches() {
    let dir = tempfile::tempdir().unwrap();
    let config: toml::Table = r#"
        [app]
        name = "startup-strict"
        strict_config = true
        [web]
        testing = "yes"
    "#
    .parse()
    .unwrap();

    let (capture, _guard) = common::capture_logger("startup-strict");
    let app = create_app(config, dir.path()).await.unwrap();

    assert!(capture.contains("Config entry [web][testing] should be boolean but is string"));
    assert_eq!(app.config().section("web").unwrap()["testing"].as_str(), Some("yes"));
}

#[tokio::test]
async fn test_nginx_reload_failure_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::with_app_name(
        common::test_config("valid_nginx", &dir.path().join("test.log")),
        "startup-nginx",
    );

    let (capture, _guard) = common::capture_logger("startup-nginx");
    let app = create_app(config, dir.path()).await;

    assert!(app.is_ok());
    assert!(capture.contains(RELOAD_FAILED_MESSAGE));
    assert!(logging::registry().get("startup-nginx").is_some());
}
