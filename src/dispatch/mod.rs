//! Query Dispatch
//!
//! Routes a statement to the pool registered for the caller's identity.
//! The dispatcher is lookup-only: it never establishes a pool, so a caller that
//! skipped `connect` gets `NotConnected` instead of an implicit connection.
//!
//! A request that carries a password is held to the same rule as `connect`: if it
//! differs from the password the pool was established with, it must pass
//! verification before the statement runs. A rejected password fails with
//! `Connection` and nothing is executed. A blank password reuses the pool as is.
//!
//! Each call is one independent statement; no transaction is opened here.
//! A failing statement is reported as `QueryExecution` and the pool stays registered.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::{ConnectionIdentity, ConnectionRequest, QueryOutcome};
use crate::error::{QueryGateError, Result};
use crate::registry::PoolRegistry;

/// Statement used by the `tables` operation
pub const LIST_TABLES_SQL: &str = "SHOW TABLES";

/// Outcome of a dispatched statement and the identity it ran under
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub identity: ConnectionIdentity,
    pub outcome: QueryOutcome,
}

/// Lookup-only statement router
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    registry: Arc<PoolRegistry>,
}

impl QueryDispatcher {
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute `statement` on the pool registered for `request`'s identity.
    ///
    /// A blank statement fails with `Validation` before any lookup happens.
    pub async fn execute(
        &self,
        request: &ConnectionRequest,
        statement: &str,
    ) -> Result<Dispatched> {
        if statement.trim().is_empty() {
            return Err(QueryGateError::validation("No SQL query provided"));
        }

        let identity = self.registry.resolve(request).identity();
        let handle = self
            .registry
            .lookup_authorized(request)
            .await?
            .ok_or_else(|| QueryGateError::not_connected(&identity))?;

        debug!(%identity, "dispatching statement");
        let outcome = handle.pool().execute(statement).await.map_err(|e| {
            warn!(%identity, error = %e.details(), "statement failed");
            e
        })?;
        debug!(%identity, rows = ?outcome.row_count(), "statement finished");

        Ok(Dispatched { identity, outcome })
    }

    /// List tables of the request's database. The database name is required.
    pub async fn list_tables(&self, request: &ConnectionRequest) -> Result<Dispatched> {
        if request.database_name().is_none() {
            return Err(QueryGateError::validation("Database name is required"));
        }
        self.execute(request, LIST_TABLES_SQL).await
    }
}
