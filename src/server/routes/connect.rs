//! Connect and change-database endpoints
//!
//! Both go through `PoolRegistry::get_or_create`; change-database only adds the
//! requirement that a database is named.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};

use crate::engine::ConnectionRequest;
use crate::error::QueryGateError;
use crate::output::{ConnectResponse, CONNECTED_MESSAGE, DATABASE_CHANGED_MESSAGE};
use crate::server::error::{ApiError, CONNECT_FAILED};
use crate::server::extract::JsonBody;
use crate::server::AppState;

/// POST /connect - create or reuse the pool for the request's identity
async fn connect(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ConnectionRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let handle = state
        .registry
        .get_or_create(&request)
        .await
        .map_err(ApiError::on_failure(CONNECT_FAILED))?;

    Ok(Json(ConnectResponse::new(CONNECTED_MESSAGE, handle.identity().database.clone())))
}

/// POST /change-database - connect with a required database name
async fn change_database(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ConnectionRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    if request.database_name().is_none() {
        return Err(ApiError::new(
            QueryGateError::validation("Database name is required"),
            CONNECT_FAILED,
        ));
    }

    let handle = state
        .registry
        .get_or_create(&request)
        .await
        .map_err(ApiError::on_failure(CONNECT_FAILED))?;

    Ok(Json(ConnectResponse::new(DATABASE_CHANGED_MESSAGE, handle.identity().database.clone())))
}

/// Connection routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connect", post(connect))
        .route("/change-database", post(change_database))
}
