//! Health check handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Issuer whose tokens are accepted.
    pub issuer: String,

    /// Number of signing keys currently cached.
    pub cached_keys: usize,
}

/// Liveness handler for GET /health
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "issuer": "https://login.example.com/v2.0",
///   "cached_keys": 2
/// }
/// ```
#[instrument(skip_all, name = "gate.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        issuer: state.config.issuer.clone(),
        cached_keys: state.verifier.key_cache().len().await,
    })
}
