//! Test doubles for specifiers and handles
//!
//! `MockSpec` opens `MockDb` handles without touching the network and records
//! every `new_db`, `update` and `close` in a shared `MockCounters`, so pool
//! behaviour can be asserted from the outside.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    BackendKind, Database, DbPoolError, Result, Specifier, downcast_spec, report_kind_mismatch,
};

/// Call counters shared by every spec and handle built from the same source
#[derive(Debug, Default)]
pub struct MockCounters {
    new_db: AtomicUsize,
    update: AtomicUsize,
    close: AtomicUsize,
}

impl MockCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn new_db_calls(&self) -> usize {
        self.new_db.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close.load(Ordering::SeqCst)
    }
}

/// Specifier stub with a single tunable
#[derive(Debug, Clone)]
pub struct MockSpec {
    kind: BackendKind,
    server: String,
    tunable: usize,
    counters: Arc<MockCounters>,
    fail_new_db: Option<String>,
    fail_update: Option<String>,
    open_delay: Option<Duration>,
}

impl MockSpec {
    pub fn new(kind: BackendKind, server: impl Into<String>) -> Self {
        Self {
            kind,
            server: server.into(),
            tunable: 0,
            counters: MockCounters::new(),
            fail_new_db: None,
            fail_update: None,
            open_delay: None,
        }
    }

    /// Set the tunable compared by `needs_update`
    pub fn with_tunable(mut self, tunable: usize) -> Self {
        self.tunable = tunable;
        self
    }

    /// Share call counters with other specs
    pub fn with_counters(mut self, counters: Arc<MockCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Make `new_db` fail with the given message
    pub fn failing_new_db(mut self, message: impl Into<String>) -> Self {
        self.fail_new_db = Some(message.into());
        self
    }

    /// Make updates to this spec fail with the given message
    pub fn failing_update(mut self, message: impl Into<String>) -> Self {
        self.fail_update = Some(message.into());
        self
    }

    /// Sleep before opening, to widen race windows
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn tunable(&self) -> usize {
        self.tunable
    }

    pub fn counters(&self) -> &Arc<MockCounters> {
        &self.counters
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }
}

#[async_trait]
impl Specifier for MockSpec {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn connection_string(&self) -> String {
        format!("mock://{}?tunable={}", self.server, self.tunable)
    }

    fn unique_server(&self) -> String {
        self.server.clone()
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        if other.kind() != self.kind {
            report_kind_mismatch(self.kind, other.kind());
            return true;
        }
        match other.as_any().downcast_ref::<MockSpec>() {
            Some(other) => other.tunable != self.tunable,
            None => true,
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        let id = self.counters.new_db.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_new_db {
            return Err(DbPoolError::Driver(message.clone()));
        }
        Ok(Arc::new(MockDb {
            spec: RwLock::new(self),
            id,
            closed: AtomicBool::new(false),
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Handle stub created by `MockSpec::new_db`
#[derive(Debug)]
pub struct MockDb {
    spec: RwLock<Arc<MockSpec>>,
    id: usize,
    closed: AtomicBool,
}

impl MockDb {
    /// Sequence number of the `new_db` call that created this handle
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn tunable(&self) -> usize {
        self.spec.read().tunable
    }
}

#[async_trait]
impl Database for MockDb {
    fn spec(&self) -> Arc<dyn Specifier> {
        self.spec.read().clone()
    }

    async fn update(&self, spec: Arc<dyn Specifier>) -> Result<()> {
        let current = self.spec.read().clone();
        current.counters.update.fetch_add(1, Ordering::SeqCst);

        let next = downcast_spec::<MockSpec>(&spec)
            .filter(|next| next.kind == current.kind)
            .ok_or(DbPoolError::KindMismatch {
                expected: current.kind,
                found: spec.kind(),
            })?;
        if let Some(message) = &next.fail_update {
            return Err(DbPoolError::Driver(message.clone()));
        }
        *self.spec.write() = next;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.spec.read().counters.close.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
