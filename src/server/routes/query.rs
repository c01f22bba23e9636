//! Statement execution and table listing endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::dispatch::Dispatched;
use crate::engine::ConnectionRequest;
use crate::output::{QueryResponse, QUERY_MESSAGE, TABLES_MESSAGE};
use crate::server::error::{ApiError, QUERY_FAILED, TABLES_FAILED};
use crate::server::extract::JsonBody;
use crate::server::AppState;

/// Execute request: the statement plus optional connection fields
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub query: Option<String>,

    #[serde(flatten)]
    pub connection: ConnectionRequest,
}

fn respond(message: &str, dispatched: Dispatched) -> Json<QueryResponse> {
    Json(QueryResponse::new(message, dispatched.outcome, dispatched.identity.database))
}

/// POST /execute-sql - run one statement on an already connected identity
async fn execute_sql(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ExecuteRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let statement = request.query.unwrap_or_default();
    let dispatched = state
        .dispatcher
        .execute(&request.connection, &statement)
        .await
        .map_err(ApiError::on_failure(QUERY_FAILED))?;

    Ok(respond(QUERY_MESSAGE, dispatched))
}

/// GET /tables?database=... - list tables of a connected database
async fn list_tables_query(
    State(state): State<Arc<AppState>>,
    Query(request): Query<ConnectionRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    list_tables(&state, &request).await
}

/// POST /tables - same as GET with a JSON body
async fn list_tables_body(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<ConnectionRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    list_tables(&state, &request).await
}

async fn list_tables(
    state: &AppState,
    request: &ConnectionRequest,
) -> Result<Json<QueryResponse>, ApiError> {
    let dispatched = state
        .dispatcher
        .list_tables(request)
        .await
        .map_err(ApiError::on_failure(TABLES_FAILED))?;

    Ok(respond(TABLES_MESSAGE, dispatched))
}

/// Query routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute-sql", post(execute_sql))
        .route("/tables", get(list_tables_query).post(list_tables_body))
}
