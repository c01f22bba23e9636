//! SQL generation endpoint

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::output::GenerateResponse;
use crate::server::error::{ApiError, GENERATE_FAILED};
use crate::server::extract::JsonBody;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /generate-sql - turn free text into SQL without executing it
async fn generate_sql(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let query = state
        .generation
        .generate_sql(request.prompt.as_deref().unwrap_or_default())
        .await
        .map_err(ApiError::on_failure(GENERATE_FAILED))?;

    Ok(Json(GenerateResponse { query }))
}

/// Generation routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/generate-sql", post(generate_sql))
}
