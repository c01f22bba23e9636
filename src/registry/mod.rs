//! Connection Pool Registry
//!
//! Owns the mapping from [`ConnectionIdentity`] to live pool. Pools are created
//! lazily on the first successful connect for an identity and reused by every
//! later call that resolves to the same identity.
//!
//! # Concurrency
//! Each identity owns one slot: an `Arc<OnceCell<..>>` stored in a `DashMap`.
//! Inserting the slot is atomic (`entry().or_default()`), and the pool is
//! established inside `OnceCell::get_or_try_init`, so racing callers for the same
//! identity wait on a single establishment instead of opening their own pools.
//! The map's shard lock is only held while the slot is fetched, never across the
//! network round trip, so a cold identity does not stall any other identity.
//!
//! A failed establishment leaves the slot empty and, once no other caller is
//! waiting on it, removes it from the map. Empty slots count as "not connected"
//! and the next connect for that identity tries again.
//!
//! # Limitations
//! - Pools are never evicted, closed or health-checked. The registry only grows
//!   for the lifetime of the process.
//! - Registry state is not persisted across restarts.
//!
//! # Password Policy
//! The password is not part of the identity. When a connect names an existing
//! identity with a different password, the new credentials are verified with a
//! one-off connection; on success the existing pool is reused, on failure the
//! call fails with `Connection` and the pool is left untouched.
//!
//! Dispatch goes through [`PoolRegistry::lookup_authorized`], which applies the
//! same check to an explicitly supplied password. A request that leaves the
//! password blank reuses the registered pool without verification.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::DefaultIdentity;
use crate::engine::{
    ConnectionIdentity, ConnectionPool, ConnectionRequest, PoolConnector, ResolvedConnection,
};
use crate::error::Result;

/// A registered pool together with its identity
#[derive(Clone)]
pub struct PoolHandle {
    identity: ConnectionIdentity,
    pool: Arc<dyn ConnectionPool>,
}

impl PoolHandle {
    #[must_use]
    pub const fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// True when both handles point at the same pool instance
    #[must_use]
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool)
    }
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("identity", &self.identity)
            .field("max_connections", &self.pool.max_connections())
            .finish()
    }
}

struct RegisteredPool {
    handle: PoolHandle,
    /// Password the pool was established with
    password: String,
}

type Slot = Arc<OnceCell<RegisteredPool>>;

/// Identity-keyed pool registry
pub struct PoolRegistry {
    connector: Arc<dyn PoolConnector>,
    defaults: DefaultIdentity,
    bootstrap_statements: Vec<String>,
    slots: DashMap<ConnectionIdentity, Slot>,
}

impl PoolRegistry {
    /// Create an empty registry
    pub fn new(connector: Arc<dyn PoolConnector>, defaults: DefaultIdentity) -> Self {
        Self {
            connector,
            defaults,
            bootstrap_statements: Vec::new(),
            slots: DashMap::new(),
        }
    }

    /// Statements to run once on every freshly established pool
    #[must_use]
    pub fn with_bootstrap_statements(mut self, statements: Vec<String>) -> Self {
        self.bootstrap_statements = statements;
        self
    }

    #[must_use]
    pub const fn defaults(&self) -> &DefaultIdentity {
        &self.defaults
    }

    /// Apply the default-fallback rule to a raw request
    #[must_use]
    pub fn resolve(&self, request: &ConnectionRequest) -> ResolvedConnection {
        request.resolve(&self.defaults)
    }

    /// Return the pool for the request's identity, establishing it if needed.
    ///
    /// On failure nothing is registered and the error is `Connection`.
    pub async fn get_or_create(&self, request: &ConnectionRequest) -> Result<PoolHandle> {
        let target = self.resolve(request);
        let identity = target.identity();
        let slot = self.slot(&identity);

        let mut established_here = false;
        let flag = &mut established_here;
        let target_ref = &target;
        let result = slot
            .get_or_try_init(|| async move {
                *flag = true;
                self.establish(target_ref).await
            })
            .await;

        let registered = match result {
            Ok(registered) => registered,
            Err(e) => {
                self.discard_failed_slot(&identity, slot);
                return Err(e);
            }
        };

        if !established_here {
            self.check_password(registered, &target).await?;
            debug!(%identity, "reusing registered pool");
        }

        Ok(registered.handle.clone())
    }

    /// Lookup for dispatch; never creates a pool.
    ///
    /// A non-blank password in `request` that differs from the one the pool was
    /// established with is verified first, and a rejection fails with
    /// `Connection`. A blank password is not checked.
    pub async fn lookup_authorized(
        &self,
        request: &ConnectionRequest,
    ) -> Result<Option<PoolHandle>> {
        let target = self.resolve(request);
        let Some(slot) = self.existing_slot(&target.identity()) else {
            return Ok(None);
        };
        let Some(registered) = slot.get() else {
            return Ok(None);
        };

        if request.password_supplied() {
            self.check_password(registered, &target).await?;
        }
        Ok(Some(registered.handle.clone()))
    }

    /// Lookup-only; never creates a pool
    #[must_use]
    pub fn lookup(&self, request: &ConnectionRequest) -> Option<PoolHandle> {
        self.lookup_identity(&self.resolve(request).identity())
    }

    /// Lookup by an already derived identity
    #[must_use]
    pub fn lookup_identity(&self, identity: &ConnectionIdentity) -> Option<PoolHandle> {
        let slot = self.slots.get(identity)?;
        slot.get().map(|registered| registered.handle.clone())
    }

    fn existing_slot(&self, identity: &ConnectionIdentity) -> Option<Slot> {
        self.slots.get(identity).map(|slot| Arc::clone(slot.value()))
    }

    /// Number of established pools
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value().initialized()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities with an established pool, sorted
    #[must_use]
    pub fn identities(&self) -> Vec<ConnectionIdentity> {
        let mut identities: Vec<_> = self
            .slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .map(|slot| slot.key().clone())
            .collect();
        identities.sort();
        identities
    }

    /// Fetch or atomically insert the slot for an identity
    fn slot(&self, identity: &ConnectionIdentity) -> Slot {
        if let Some(existing) = self.existing_slot(identity) {
            return existing;
        }
        Arc::clone(self.slots.entry(identity.clone()).or_default().value())
    }

    /// Remove a slot left empty by a failed establishment.
    ///
    /// Our reference is released first; the slot only goes once the map holds the
    /// last reference, so a caller still waiting on it keeps it alive and removes
    /// it itself if its own attempt fails too.
    fn discard_failed_slot(&self, identity: &ConnectionIdentity, slot: Slot) {
        let ptr = Arc::as_ptr(&slot);
        drop(slot);

        let removed = self.slots.remove_if(identity, |_, current| {
            Arc::as_ptr(current) == ptr && Arc::strong_count(current) == 1 && !current.initialized()
        });
        if removed.is_some() {
            debug!(%identity, "discarded empty slot after failed establishment");
        }
    }

    /// Verify `target` when its password differs from the registered one
    async fn check_password(
        &self,
        registered: &RegisteredPool,
        target: &ResolvedConnection,
    ) -> Result<()> {
        if registered.password == target.password {
            return Ok(());
        }
        let identity = &registered.handle.identity;
        debug!(%identity, "password differs from registered pool, verifying credentials");
        self.connector.verify(target).await.map_err(|e| {
            warn!(%identity, error = %e.details(), "credential verification failed");
            e
        })
    }

    async fn establish(&self, target: &ResolvedConnection) -> Result<RegisteredPool> {
        let identity = target.identity();
        info!(%identity, "establishing connection pool");

        let pool = self.connector.establish(target).await.map_err(|e| {
            warn!(
                %identity,
                code = e.error_code(),
                error = %e.details(),
                "pool establishment failed"
            );
            e
        })?;

        for statement in &self.bootstrap_statements {
            if let Err(e) = pool.execute(statement).await {
                warn!(%identity, error = %e.details(), "bootstrap statement failed");
            }
        }

        info!(%identity, max_connections = pool.max_connections(), "connection pool established");

        Ok(RegisteredPool {
            handle: PoolHandle { identity, pool },
            password: target.password.clone(),
        })
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("defaults", &self.defaults)
            .field("pools", &self.identities())
            .finish_non_exhaustive()
    }
}
