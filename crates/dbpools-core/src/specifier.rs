//! Specifier and Database traits

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{BackendKind, Result};

/// Desired configuration of a connection to one logical backend server.
///
/// Specifiers are built fresh for every connect request and never mutated
/// afterwards. The canonical identity returned by [`Specifier::unique_server`]
/// decides which pool slot a handle lives in; tunables (pool sizes, timeouts)
/// are left out of it so that retuning a server updates its handle in place.
#[async_trait]
pub trait Specifier: Send + Sync + fmt::Debug + 'static {
    /// The backend kind, used to route to a server pool
    fn kind(&self) -> BackendKind;

    /// Backend string sufficient to open a handle. May contain secrets.
    fn connection_string(&self) -> String;

    /// Canonical identity of the server. Pure, deterministic, free of
    /// tuning-only parameters and raw credentials.
    fn unique_server(&self) -> String;

    /// Returns true when `other` carries tunables different from `self`.
    ///
    /// Comparing specifiers of different kinds is a programming error;
    /// implementations log it and report that an update is needed so the
    /// subsequent `Database::update` surfaces a kind mismatch.
    fn needs_update(&self, other: &dyn Specifier) -> bool;

    /// Open a brand-new handle. Failure must not leak partially opened
    /// resources.
    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Owned downcast support, see [`downcast_spec`]
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A live, shareable connection to one backend server.
///
/// A handle is owned by exactly one server-pool slot; callers receive shared
/// references. It is reconfigured in place by `update` and only closed when
/// evicted or when the pools shut down.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// The specifier the handle was last configured from
    fn spec(&self) -> Arc<dyn Specifier>;

    /// Re-apply tunables from `spec` without closing the handle
    async fn update(&self, spec: Arc<dyn Specifier>) -> Result<()>;

    /// Release every resource held by the handle
    async fn close(&self) -> Result<()>;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

impl dyn Database {
    /// Borrow the concrete handle type behind a shared handle
    pub fn downcast_ref<T: Database>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("spec", &self.spec())
            .finish()
    }
}

/// Recover the concrete specifier type from a shared specifier
pub fn downcast_spec<S: Specifier>(spec: &Arc<dyn Specifier>) -> Option<Arc<S>> {
    spec.clone().into_any().downcast::<S>().ok()
}

/// Log a cross-kind comparison. Used by `needs_update` implementations.
pub fn report_kind_mismatch(expected: BackendKind, found: BackendKind) {
    tracing::error!(
        expected = %expected,
        found = %found,
        "tried to compare wrong database kinds"
    );
}
