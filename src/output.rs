//! JSON Response Bodies
//!
//! This module defines the JSON bodies returned by every HTTP operation.
//! Field names are part of the public contract and must not change.
//!
//! # Output Contract
//! - connect / change-database: `{"message": "...", "database": "..." | null}`
//! - execute-sql / tables: `{"message": "...", "results": [...] | {...}, "database": ...}`
//! - generate-sql: `{"query": "..."}`
//! - Errors: `{"error": "<category>", "details": "..."}`, or `{"error", "message"}` for
//!   not-connected, or just `{"error"}` for validation failures.

use serde::{Deserialize, Serialize};

use crate::engine::QueryOutcome;
use crate::error::QueryGateError;

pub const CONNECTED_MESSAGE: &str = "Connected successfully";
pub const DATABASE_CHANGED_MESSAGE: &str = "Database changed successfully";
pub const QUERY_MESSAGE: &str = "Query executed successfully";
pub const TABLES_MESSAGE: &str = "Tables retrieved successfully";
pub const NOT_CONNECTED_ERROR: &str = "Database not connected";
pub const NOT_CONNECTED_HINT: &str =
    "Please connect to a database first using the /connect endpoint";

/// Body for connect and change-database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub message: String,
    pub database: Option<String>,
}

impl ConnectResponse {
    pub fn new(message: impl Into<String>, database: Option<String>) -> Self {
        Self {
            message: message.into(),
            database,
        }
    }
}

/// Body for execute-sql and tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub message: String,
    pub results: QueryOutcome,
    pub database: Option<String>,
}

impl QueryResponse {
    pub fn new(
        message: impl Into<String>,
        results: QueryOutcome,
        database: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            results,
            database,
        }
    }
}

/// Body for generate-sql
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub query: String,
}

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short category, e.g. "Query execution failed"
    pub error: String,

    /// Underlying cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Hint for the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Body carrying only a category
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            message: None,
        }
    }

    /// Body with category and details
    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            message: None,
        }
    }

    /// Map an error to its body.
    ///
    /// `failure` is the category shown for non-validation failures,
    /// e.g. "Table retrieval failed".
    #[must_use]
    pub fn from_error(err: &QueryGateError, failure: &str) -> Self {
        match err {
            QueryGateError::Validation(message) => Self::new(message.clone()),
            QueryGateError::NotConnected { .. } => Self {
                error: NOT_CONNECTED_ERROR.to_string(),
                details: None,
                message: Some(NOT_CONNECTED_HINT.to_string()),
            },
            QueryGateError::Connection(_)
            | QueryGateError::QueryExecution(_)
            | QueryGateError::Generation(_)
            | QueryGateError::Config(_) => Self::with_details(failure, err.details()),
        }
    }
}

/// Body for `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Number of established pools
    pub pools: usize,
}
