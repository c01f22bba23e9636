//! API error type with IntoResponse
//!
//! Errors are converted to JSON bodies (see [`crate::output::ErrorBody`]) with
//! status codes: validation and not-connected are 400, everything else is 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::QueryGateError;
use crate::output::ErrorBody;

/// Category reported when a connect or change-database call fails
pub const CONNECT_FAILED: &str = "Database connection failed";
/// Category reported when execute-sql fails on the database
pub const QUERY_FAILED: &str = "Query execution failed";
/// Category reported when listing tables fails on the database
pub const TABLES_FAILED: &str = "Table retrieval failed";
/// Category reported when the text generator fails
pub const GENERATE_FAILED: &str = "Failed to generate SQL";

/// An operation error plus the category the operation reports on failure
#[derive(Debug)]
pub struct ApiError {
    error: QueryGateError,
    failure: &'static str,
}

impl ApiError {
    pub const fn new(error: QueryGateError, failure: &'static str) -> Self {
        Self { error, failure }
    }

    /// Bad request that never reached the core
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(QueryGateError::validation(message), "Invalid request")
    }

    /// Adapter for `map_err`
    pub fn on_failure(failure: &'static str) -> impl Fn(QueryGateError) -> Self {
        move |error| Self::new(error, failure)
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.error {
            QueryGateError::Validation(_) | QueryGateError::NotConnected { .. } => {
                StatusCode::BAD_REQUEST
            }
            QueryGateError::Connection(_)
            | QueryGateError::QueryExecution(_)
            | QueryGateError::Generation(_)
            | QueryGateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn error(&self) -> &QueryGateError {
        &self.error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                code = self.error.error_code(),
                error = %self.error.details(),
                "{}",
                self.failure
            );
        } else {
            tracing::debug!(
                code = self.error.error_code(),
                error = %self.error.details(),
                "request rejected"
            );
        }

        (status, Json(ErrorBody::from_error(&self.error, self.failure))).into_response()
    }
}
