//! Connection Types and Pool Traits
//!
//! This module defines the core abstractions shared by the registry, the dispatcher
//! and the HTTP layer:
//! - [`ConnectionRequest`]: raw, partially specified connection fields from a caller
//! - [`ResolvedConnection`]: the same fields after default fallback
//! - [`ConnectionIdentity`]: the `(host, user, database)` registry key
//! - [`QueryOutcome`]: rows or a no-result acknowledgment
//! - [`PoolConnector`] / [`ConnectionPool`]: the seam to the database driver
//!
//! # Engine Isolation
//! Driver-specific code lives in submodules (`mysql`). Nothing outside them touches
//! driver types, so the registry and dispatcher can be exercised with in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::DefaultIdentity;
use crate::error::Result;

// MySQL engine
#[cfg(feature = "mysql")]
pub mod mysql;

/// Connection fields as supplied by a caller
///
/// Every field is optional. Blank values (missing, empty or whitespace-only) are
/// replaced by the [`DefaultIdentity`] during [`ConnectionRequest::resolve`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionRequest {
    /// Request that only names a database; everything else falls back to defaults
    #[must_use]
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }

    /// The database field if it is non-blank
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        non_blank(self.database.as_ref())
    }

    /// True when the caller supplied a non-blank password
    #[must_use]
    pub fn password_supplied(&self) -> bool {
        non_blank(self.password.as_ref()).is_some()
    }

    /// Apply default fallback to every blank field
    #[must_use]
    pub fn resolve(&self, defaults: &DefaultIdentity) -> ResolvedConnection {
        ResolvedConnection {
            host: non_blank(self.host.as_ref()).unwrap_or(&defaults.host).to_string(),
            port: defaults.port,
            user: non_blank(self.user.as_ref()).unwrap_or(&defaults.user).to_string(),
            password: non_blank(self.password.as_ref())
                .unwrap_or(&defaults.password)
                .to_string(),
            database: self.database_name().map(str::to_string),
        }
    }
}

/// Fully resolved connection target
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl ResolvedConnection {
    /// Registry key for this target (password excluded)
    #[must_use]
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity {
            host: self.host.clone(),
            user: self.user.clone(),
            database: self.database.clone(),
        }
    }
}

impl fmt::Debug for ResolvedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Registry key: `(host, user, database-or-null)`
///
/// Equality is exact string equality on all three fields, with no normalization.
/// Safe to expose to callers; it never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    pub host: String,
    pub user: String,
    pub database: Option<String>,
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(db) => write!(f, "{}@{}/{}", self.user, self.host, db),
            None => write!(f, "{}@{}", self.user, self.host),
        }
    }
}

/// Result of a single dispatched statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Row-producing statement (possibly zero rows), one JSON object per row
    Rows(Vec<serde_json::Map<String, serde_json::Value>>),

    /// Statement that mutated data or schema without producing rows
    #[serde(rename_all = "camelCase")]
    Ack {
        affected_rows: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_id: Option<u64>,
    },
}

impl QueryOutcome {
    /// Number of rows returned, `None` for acknowledgments
    #[must_use]
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Rows(rows) => Some(rows.len()),
            Self::Ack { .. } => None,
        }
    }
}

/// A capacity-bounded set of reusable connections to one endpoint
///
/// Callers beyond capacity wait for a free connection in arrival order.
/// There is no limit on the wait queue and no acquisition timeout.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Run one statement on a pooled connection.
    ///
    /// Failures are reported as `QueryExecution` and must leave the pool usable.
    async fn execute(&self, statement: &str) -> Result<QueryOutcome>;

    /// Fixed maximum number of concurrent connections
    fn max_connections(&self) -> usize;
}

/// Establishes pools against a database endpoint
#[async_trait]
pub trait PoolConnector: Send + Sync {
    /// Create a pool and prove it works by acquiring one live connection.
    ///
    /// Must return `Connection` on auth failure, unreachable host or timeout.
    async fn establish(&self, target: &ResolvedConnection) -> Result<Arc<dyn ConnectionPool>>;

    /// Check credentials with a single short-lived connection, without creating a pool
    async fn verify(&self, target: &ResolvedConnection) -> Result<()>;
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}
