//! One server pool per backend kind

use std::collections::HashMap;
use std::sync::Arc;

use dbpools_core::{BackendKind, Database, DbPoolError, PoolsConfig, Result, Specifier};

use super::connect::{connect, flush_entry};
use super::server_pool::ServerPool;

/// Registry of server pools, one per registered backend kind
///
/// Constructed once by the host and passed to whatever needs handles.
#[derive(Debug)]
pub struct Pools {
    pools: HashMap<BackendKind, Arc<ServerPool>>,
}

impl Pools {
    /// Create pools for every built-in backend kind
    pub fn new() -> Self {
        Self::with_kinds(BackendKind::ALL)
    }

    /// Create pools for the given kinds only
    pub fn with_kinds(kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        let pools = kinds
            .into_iter()
            .map(|kind| (kind, Arc::new(ServerPool::new(kind))))
            .collect();
        Self { pools }
    }

    /// Create pools for the kinds named in the configuration
    pub fn from_config(config: &PoolsConfig) -> Self {
        Self::with_kinds(config.kinds.iter().copied())
    }

    /// The server pool for a backend kind
    pub fn pool_for(&self, kind: BackendKind) -> Result<&Arc<ServerPool>> {
        self.pools.get(&kind).ok_or(DbPoolError::NoPool(kind))
    }

    /// Every registered server pool
    pub fn server_pools(&self) -> impl Iterator<Item = &Arc<ServerPool>> {
        self.pools.values()
    }

    /// Registered backend kinds
    pub fn kinds(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.pools.keys().copied()
    }

    /// Return the shared handle for `spec`, opening or retuning it as needed
    pub async fn connect(&self, spec: Arc<dyn Specifier>) -> Result<Arc<dyn Database>> {
        let pool = self.pool_for(spec.kind())?;
        connect(pool, spec).await
    }

    /// [`Pools::connect`] on the outcome of building a specifier, so that
    /// configuration errors surface through the same call
    pub async fn connect_with(
        &self,
        spec: Result<Arc<dyn Specifier>>,
    ) -> Result<Arc<dyn Database>> {
        self.connect(spec?).await
    }

    /// Evict and close the handle for `spec`, if pooled
    pub async fn flush(&self, spec: &dyn Specifier) -> Result<bool> {
        let pool = self.pool_for(spec.kind())?;
        flush_entry(pool, spec).await
    }

    /// Close every handle in every pool.
    ///
    /// All handles are closed even if some fail; the first failure is
    /// returned. Returns the number of handles closed otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<usize> {
        let mut closed = 0;
        let mut first_err = None;

        for pool in self.pools.values() {
            for (id, db) in pool.drain().await {
                match db.close().await {
                    Ok(()) => closed += 1,
                    Err(e) => {
                        tracing::warn!(kind = %pool.kind(), server = %id, error = %e, "failed to close handle");
                        first_err.get_or_insert(e);
                    }
                }
            }
        }

        tracing::info!(closed, "pools shut down");
        match first_err {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new()
    }
}
