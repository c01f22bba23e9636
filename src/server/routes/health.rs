//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::output::HealthResponse;
use crate::server::AppState;

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pools: state.registry.len(),
    })
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
