//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the allowlist API
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Serve on a listener until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::allowlist::AllowlistStore;
use crate::config::WebSettings;
use crate::http::handlers::{add_entry, health, list_entries, remove_entry};
use crate::lifecycle::reload::ProxyReloader;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<AllowlistStore>,
    /// Present only when reloads are enabled.
    pub reloader: Option<Arc<ProxyReloader>>,
    /// How long a mutation waits for its reload. Kept below the request
    /// timeout so a slow proxy never fails the request.
    pub reload_wait: Duration,
}

impl AppState {
    /// Reload the proxy after a successful change, if enabled.
    ///
    /// The reload runs as its own task so it finishes and logs its outcome
    /// even when the caller stops waiting. Returns whether it succeeded
    /// within `reload_wait`.
    pub async fn after_mutation(&self) -> bool {
        let Some(reloader) = self.reloader.clone() else {
            return false;
        };
        let task = tokio::spawn(async move { reloader.reload().await });

        match tokio::time::timeout(self.reload_wait, task).await {
            Ok(Ok(outcome)) => outcome.is_success(),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Reload task failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    wait_ms = self.reload_wait.as_millis() as u64,
                    "Reload still running, responding without it"
                );
                false
            }
        }
    }
}

/// Build the Axum router with all middleware layers.
///
/// The timeout sits innermost so it wraps the router's own body type.
#[allow(deprecated)]
pub fn build_router(state: AppState, web: &WebSettings) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/allowlist", get(list_entries).post(add_entry))
        .route("/api/allowlist/{*entry}", delete(remove_entry))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(web.max_body_bytes))
                .layer(TimeoutLayer::new(web.request_timeout)),
        )
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(
    router: Router,
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
