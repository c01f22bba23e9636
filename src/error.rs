//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Querygate.
//! All errors are structured and map to stable error codes for JSON output.
//!
//! # Error Categories
//! - `Validation`: Missing or blank required request fields
//! - `Connection`: Endpoint unreachable or credentials rejected while establishing a pool
//! - `NotConnected`: Dispatch against an identity with no registered pool
//! - `QueryExecution`: Statement rejected by the database engine
//! - `Generation`: Text generation capability unavailable or erroring
//! - `Config`: Startup configuration errors
//!
//! Every error is request-scoped except `Connection` during pool establishment,
//! which leaves that identity unconnected until a later connect succeeds.

use thiserror::Error;

/// Main error type for Querygate operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryGateError {
    /// Missing or blank required field
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Pool establishment failed (auth rejected, host unreachable, ...)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No pool is registered for the requested identity
    #[error("No connection pool registered for {identity}")]
    NotConnected { identity: String },

    /// Statement execution failed on an existing pool
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Text generation capability failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Configuration error (file not found, invalid JSON, blank defaults, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QueryGateError {
    /// Convert error to error code string for JSON output and logs
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::NotConnected { .. } => "NOT_CONNECTED",
            Self::QueryExecution(_) => "QUERY_EXECUTION_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Underlying cause without the category prefix.
    ///
    /// This is what the HTTP layer reports as `details`. It never contains passwords.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::Connection(m)
            | Self::QueryExecution(m)
            | Self::Generation(m)
            | Self::Config(m) => m.clone(),
            Self::NotConnected { identity } => {
                format!("No connection pool registered for {identity}")
            }
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a not-connected error for a displayable identity
    pub fn not_connected(identity: impl std::fmt::Display) -> Self {
        Self::NotConnected {
            identity: identity.to_string(),
        }
    }

    /// Create a query execution error
    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for Querygate operations
pub type Result<T> = std::result::Result<T, QueryGateError>;
