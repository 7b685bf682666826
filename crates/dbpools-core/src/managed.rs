//! Deadpool-backed handles
//!
//! The SQL backends and Redis all expose the same shape of handle: a bounded
//! pool of driver connections that can be resized without being torn down.
//! `ManagedDb` implements `Database` once for all of them; a backend only
//! provides its deadpool `Manager` through [`ManagedSpec`].

use std::any::Any;
use std::cell::Cell;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool::managed::{Manager, Object, Pool, PoolError, Status};
use parking_lot::RwLock;

use crate::{Database, DbPoolError, PoolLimits, Result, Specifier, downcast_spec};

/// The specifier currently applied to a handle, shared with its manager so
/// connections created after an update pick up the new tunables.
pub type SharedSpec<S> = Arc<RwLock<Arc<S>>>;

/// A specifier whose handle is a deadpool pool
pub trait ManagedSpec: Specifier + Sized {
    /// Deadpool manager creating and recycling driver connections
    type Manager: Manager<Error = DbPoolError> + 'static;

    /// Pool size limits carried by this specifier
    fn limits(&self) -> PoolLimits;

    /// Build the manager for a new handle
    fn manager(spec: SharedSpec<Self>) -> Self::Manager;
}

/// A pooled handle over a deadpool pool
pub struct ManagedDb<S: ManagedSpec> {
    pool: Pool<S::Manager>,
    spec: SharedSpec<S>,
}

impl<S: ManagedSpec> ManagedDb<S> {
    /// Build the pool and verify the backend is reachable.
    ///
    /// On failure the pool is closed before the error is returned, so a
    /// failed open leaves nothing behind.
    #[tracing::instrument(skip(spec), fields(kind = %spec.kind(), server = %spec.unique_server()))]
    pub async fn open(spec: Arc<S>) -> Result<Self> {
        let limits = spec.limits();
        let shared: SharedSpec<S> = Arc::new(RwLock::new(spec));
        let pool = Pool::builder(S::manager(shared.clone()))
            .max_size(limits.pool_size())
            .build()
            .map_err(|e| DbPoolError::Configuration(e.to_string()))?;

        match pool.get().await {
            Ok(conn) => drop(conn),
            Err(e) => {
                pool.close();
                return Err(from_pool_error(e));
            }
        }

        tracing::debug!(max_size = limits.pool_size(), "pool opened");
        Ok(Self { pool, spec: shared })
    }

    /// Check out a driver connection
    pub async fn get(&self) -> Result<Object<S::Manager>> {
        self.pool.get().await.map_err(from_pool_error)
    }

    /// Current pool status
    pub fn status(&self) -> Status {
        self.pool.status()
    }

    /// The concrete specifier currently applied
    pub fn current_spec(&self) -> Arc<S> {
        self.spec.read().clone()
    }

    /// Drop idle connections beyond `keep`
    fn trim_idle(&self, keep: usize) {
        let kept = Cell::new(0);
        let _ = self.pool.retain(|_, _| {
            if kept.get() < keep {
                kept.set(kept.get() + 1);
                true
            } else {
                false
            }
        });
    }
}

fn from_pool_error(err: PoolError<DbPoolError>) -> DbPoolError {
    match err {
        PoolError::Backend(e) => e,
        PoolError::Closed => DbPoolError::Closed("pool is closed".into()),
        other => DbPoolError::Driver(other.to_string()),
    }
}

#[async_trait]
impl<S: ManagedSpec> Database for ManagedDb<S> {
    fn spec(&self) -> Arc<dyn Specifier> {
        self.spec.read().clone()
    }

    #[tracing::instrument(skip(self, spec), fields(kind = %spec.kind(), server = %spec.unique_server()))]
    async fn update(&self, spec: Arc<dyn Specifier>) -> Result<()> {
        let current = self.current_spec();
        let next = downcast_spec::<S>(&spec).ok_or(DbPoolError::KindMismatch {
            expected: current.kind(),
            found: spec.kind(),
        })?;

        let limits = next.limits();
        self.pool.resize(limits.pool_size());
        self.trim_idle(limits.idle_size());
        *self.spec.write() = next;

        tracing::debug!(
            max_size = limits.pool_size(),
            max_idle = limits.idle_size(),
            "pool resized"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
