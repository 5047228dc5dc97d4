//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve and merge configuration
//! - Configure the application logger before anything else logs
//! - Open the allowlist store and build the reloader and router
//!
//! # Design Decisions
//! - Fail fast on config and log sink errors
//! - A failed startup reload is logged, never fatal

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::allowlist::{AllowlistStore, StoreError, STORE_FILE_NAME};
use crate::config::merge::{type_mismatches, warn_unexpected_keys, ROOT_LABEL};
use crate::config::{default_config, AllowlistConfig, ConfigError, ConfigSource};
use crate::http::{self, AppState};
use crate::lifecycle::reload::ProxyReloader;
use crate::observability::logging::{self, Logger, LoggingError};

/// Fatal errors while constructing the application.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create instance directory {}: {source}", path.display())]
    InstanceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A fully constructed application.
pub struct AllowlistApp {
    config: Arc<AllowlistConfig>,
    logger: Arc<Logger>,
    state: AppState,
    router: Router,
    instance_path: PathBuf,
}

impl AllowlistApp {
    pub fn config(&self) -> &AllowlistConfig {
        &self.config
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    /// A clone of the HTTP router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve the application until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        http::serve(self.router, listener, shutdown).await
    }
}

/// Build the application from a configuration source and instance directory.
pub async fn create_app(
    source: impl Into<ConfigSource>,
    instance_path: impl AsRef<Path>,
) -> Result<AllowlistApp, StartupError> {
    let instance_path = instance_path.as_ref().to_path_buf();
    std::fs::create_dir_all(&instance_path).map_err(|source| StartupError::InstanceDir {
        path: instance_path.clone(),
        source,
    })?;

    let source: ConfigSource = source.into();
    let resolved = source.resolve(&instance_path)?;
    let user = &resolved.table;
    let config = AllowlistConfig::from_user(user);

    let logger = logging::registry().configure(&config.app_name(), &config.logging_settings(&instance_path))?;

    // Sinks are in place; diagnostics from here on are recorded.
    resolved.report();
    let schema = default_config();
    warn_unexpected_keys(&schema, user, ROOT_LABEL);
    if config.strict() {
        for mismatch in type_mismatches(&schema, user) {
            tracing::error!(path = %mismatch.path, "{}", mismatch);
        }
    }

    let store = Arc::new(AllowlistStore::open(instance_path.join(STORE_FILE_NAME)).await?);

    let reload = config.reload_settings();
    let reloader = reload
        .enabled
        .then(|| Arc::new(ProxyReloader::from_settings(&reload)));

    let web = config.web_settings();
    let state = AppState {
        store,
        reloader,
        reload_wait: web.request_timeout / 2,
    };
    if let Some(reloader) = &state.reloader {
        reloader.reload().await;
    }

    let router = http::build_router(state.clone(), &web);

    tracing::info!(
        app = %config.app_name(),
        instance = %instance_path.display(),
        reload_enabled = reload.enabled,
        testing = web.testing,
        "Application created"
    );

    Ok(AllowlistApp {
        config: Arc::new(config),
        logger,
        state,
        router,
        instance_path,
    })
}
