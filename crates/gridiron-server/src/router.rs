//! Axum router construction.
//!
//! Assembles the live socket and REST routes into a single [`Router`] with
//! permissive CORS so the browser renderer can call the API from any
//! origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /health` -- liveness probe
/// - `GET /ws/live` -- live feed `WebSocket`
/// - `GET /api/state` -- folded game snapshot and connection count
///
/// Anything else answers 404 with a JSON error body.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws/live", get(ws::ws_live))
        .route("/api/state", get(handlers::get_state))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
