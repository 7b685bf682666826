//! Invalidation listener
//!
//! Endpoint changes are delivered asynchronously as notifications. Every
//! notification that resolves to a specifier evicts and closes the handle
//! pooled for it, so the next connect opens a fresh one. A reconnect signal
//! (the notification source may have missed events) sweeps every pool.
//!
//! # Example
//!
//! ```ignore
//! use dbpools_registry::{ListenerEvent, PoolListener};
//!
//! let listener = PoolListener::new(pools.clone()).with_resolver(connectors);
//! tokio::spawn(listener.run(events));
//! ```

use std::fmt;
use std::sync::Arc;

use dbpools_core::{DbPoolError, EndpointRecord, Result, Specifier, SpecifierResolver};
use futures::stream::{Stream, StreamExt as _};

use crate::pool::{Pools, flush_entry};


/// What happened to the endpoint a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Changed,
    Deleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The endpoint a notification refers to
#[derive(Debug, Clone)]
pub enum Payload {
    /// An already built specifier
    Specifier(Arc<dyn Specifier>),
    /// A stored endpoint record, resolved through the listener's resolver
    Record(EndpointRecord),
    /// The producer could not describe the endpoint; logged and ignored
    Unresolvable(String),
}

/// A change notification for one endpoint
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: Payload,
}

impl Notification {
    pub fn changed(payload: Payload) -> Self {
        Self {
            kind: NotificationKind::Changed,
            payload,
        }
    }

    pub fn deleted(payload: Payload) -> Self {
        Self {
            kind: NotificationKind::Deleted,
            payload,
        }
    }
}

/// An item of the listener's event stream
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    Notify(Notification),
    /// The notification source reconnected; every handle may be stale
    Reconnect,
}

/// Evicts pooled handles as endpoint configuration changes
pub struct PoolListener {
    pools: Arc<Pools>,
    resolver: Option<Arc<dyn SpecifierResolver>>,
}

impl PoolListener {
    pub fn new(pools: Arc<Pools>) -> Self {
        Self {
            pools,
            resolver: None,
        }
    }

    /// Resolve [`Payload::Record`] payloads through `resolver`
    pub fn with_resolver(mut self, resolver: Arc<dyn SpecifierResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn pools(&self) -> &Arc<Pools> {
        &self.pools
    }

    fn resolve(&self, payload: Payload) -> Result<Arc<dyn Specifier>> {
        match payload {
            Payload::Specifier(spec) => Ok(spec),
            Payload::Record(record) => {
                let resolver = self.resolver.as_ref().ok_or_else(|| {
                    DbPoolError::Resolution(format!(
                        "no resolver for endpoint record {}",
                        record.id
                    ))
                })?;
                resolver.resolve(&record)
            }
            Payload::Unresolvable(reason) => Err(DbPoolError::Resolution(reason)),
        }
    }

    /// Handle one notification. Returns whether a handle was evicted.
    ///
    /// Errors are logged, never returned, so a bad notification cannot stop
    /// the listener.
    #[tracing::instrument(skip(self, notification), fields(event = %notification.kind))]
    pub async fn notify(&self, notification: Notification) -> bool {
        let spec = match self.resolve(notification.payload) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unresolvable notification");
                return false;
            }
        };

        let pool = match self.pools.pool_for(spec.kind()) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, server = %spec.unique_server(), "ignoring notification");
                return false;
            }
        };

        match flush_entry(pool, spec.as_ref()).await {
            Ok(evicted) => evicted,
            Err(e) => {
                tracing::warn!(error = %e, "failed to close evicted handle");
                true
            }
        }
    }

    /// Evict and close every pooled handle. Returns how many were evicted.
    #[tracing::instrument(skip(self))]
    pub async fn reconnect(&self) -> usize {
        let mut evicted = 0;
        for pool in self.pools.server_pools() {
            for spec in pool.iter().await {
                match flush_entry(pool, spec.as_ref()).await {
                    Ok(true) => evicted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        evicted += 1;
                        tracing::warn!(error = %e, "failed to close evicted handle");
                    }
                }
            }
        }
        tracing::info!(evicted, "swept all pools");
        evicted
    }

    /// Consume events until the stream ends
    pub async fn run<S>(self, events: S)
    where
        S: Stream<Item = ListenerEvent> + Send,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match event {
                ListenerEvent::Notify(notification) => {
                    self.notify(notification).await;
                }
                ListenerEvent::Reconnect => {
                    self.reconnect().await;
                }
            }
        }
        tracing::debug!("event stream ended");
    }
}
