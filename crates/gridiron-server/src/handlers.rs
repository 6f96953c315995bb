//! REST handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::Uri;
use gridiron_types::GameState;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthResponse {
    /// Always `true` while the process is serving.
    pub ok: bool,
}

/// Body of `GET /api/state`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    /// The folded game, or `null` before the first broadcast.
    pub state: Option<GameState>,
    /// Number of connected viewers.
    pub connections: usize,
    /// Seconds since the server started.
    pub uptime_secs: i64,
}

/// Liveness probe.
///
/// # Route
///
/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Current game snapshot and connection count.
///
/// # Route
///
/// `GET /api/state`
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    let broadcaster = state.broadcaster();
    Json(StateResponse {
        state: broadcaster.snapshot(),
        connections: broadcaster.connection_count(),
        uptime_secs: chrono::Utc::now()
            .signed_duration_since(state.started_at())
            .num_seconds(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_owned())
}
