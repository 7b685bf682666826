//! dbpools Registry - Shared handles keyed by server identity
//!
//! This crate owns the live handles opened from specifiers. It guarantees at
//! most one handle per canonical server identity and backend kind, retunes
//! handles in place when a specifier's tunables change, and evicts handles
//! when endpoint configuration changes.

pub mod listener;
pub mod pool;

pub use listener::{ListenerEvent, Notification, NotificationKind, Payload, PoolListener};
pub use pool::{Pools, ReadSlots, ServerPool, SpecSnapshot, WriteSlots, connect, flush_entry};
