//! Allowlist API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::allowlist::StoreError;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AddEntryRequest {
    pub entry: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    pub entry: String,
    /// Whether the store changed.
    pub changed: bool,
    /// Whether the proxy was reloaded successfully afterwards.
    pub reloaded: bool,
}

/// Store errors mapped onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoreError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
            StoreError::Io { .. } => {
                tracing::error!(error = %self.0, "Allowlist store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn list_entries(State(state): State<AppState>) -> Result<Json<EntriesResponse>, ApiError> {
    let entries = state.store.list().await?;
    Ok(Json(EntriesResponse { entries }))
}

pub async fn add_entry(
    State(state): State<AppState>,
    Json(request): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let changed = state.store.add(&request.entry).await?;
    let entry = request.entry.trim().to_string();

    let (status, reloaded) = if changed {
        tracing::info!(entry = %entry, "Allowlist entry added");
        (StatusCode::CREATED, state.after_mutation().await)
    } else {
        (StatusCode::OK, false)
    };

    Ok((status, Json(MutationResponse { entry, changed, reloaded })))
}

pub async fn remove_entry(
    State(state): State<AppState>,
    Path(entry): Path<String>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let changed = state.store.remove(&entry).await?;
    let entry = entry.trim().to_string();

    let (status, reloaded) = if changed {
        tracing::info!(entry = %entry, "Allowlist entry removed");
        (StatusCode::OK, state.after_mutation().await)
    } else {
        (StatusCode::NOT_FOUND, false)
    };

    Ok((status, Json(MutationResponse { entry, changed, reloaded })))
}
