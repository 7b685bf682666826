//! Per-kind map of live handles

use std::collections::HashMap;
use std::sync::Arc;

use dbpools_core::{BackendKind, Database, Specifier};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Slots = HashMap<String, Arc<dyn Database>>;

/// Live handles of one backend kind, keyed by canonical server identity
///
/// Reads run concurrently; any mutation excludes every other access. The
/// lock is async because handles are opened while the write lock is held.
pub struct ServerPool {
    kind: BackendKind,
    slots: RwLock<Slots>,
}

impl ServerPool {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The backend kind served by this pool
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Acquire the shared lock
    pub async fn read(&self) -> ReadSlots<'_> {
        ReadSlots(self.slots.read().await)
    }

    /// Acquire the exclusive lock
    pub async fn write(&self) -> WriteSlots<'_> {
        WriteSlots(self.slots.write().await)
    }

    /// Look up a handle by identity
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Database>> {
        self.read().await.get(id)
    }

    /// Store a handle, returning the one it replaced
    pub async fn put(&self, id: impl Into<String>, db: Arc<dyn Database>) -> Option<Arc<dyn Database>> {
        self.write().await.put(id, db)
    }

    /// Remove a handle without closing it
    pub async fn delete(&self, id: &str) -> Option<Arc<dyn Database>> {
        self.write().await.delete(id)
    }

    /// Snapshot of the specifiers of every pooled handle
    pub async fn iter(&self) -> SpecSnapshot {
        self.read().await.specs()
    }

    pub async fn len(&self) -> usize {
        self.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.read().await.is_empty()
    }

    /// Remove every handle without closing them
    pub async fn drain(&self) -> Vec<(String, Arc<dyn Database>)> {
        self.slots.write().await.drain().collect()
    }
}

impl std::fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPool")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Shared view of a server pool's slots
pub struct ReadSlots<'a>(RwLockReadGuard<'a, Slots>);

impl ReadSlots<'_> {
    pub fn get(&self, id: &str) -> Option<Arc<dyn Database>> {
        self.0.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Snapshot of the specifiers of every pooled handle
    pub fn specs(&self) -> SpecSnapshot {
        SpecSnapshot(
            self.0
                .values()
                .map(|db| db.spec())
                .collect::<Vec<_>>()
                .into_iter(),
        )
    }
}

/// Exclusive view of a server pool's slots
pub struct WriteSlots<'a>(RwLockWriteGuard<'a, Slots>);

impl WriteSlots<'_> {
    pub fn get(&self, id: &str) -> Option<Arc<dyn Database>> {
        self.0.get(id).cloned()
    }

    pub fn put(&mut self, id: impl Into<String>, db: Arc<dyn Database>) -> Option<Arc<dyn Database>> {
        self.0.insert(id.into(), db)
    }

    pub fn delete(&mut self, id: &str) -> Option<Arc<dyn Database>> {
        self.0.remove(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Finite, one-shot snapshot of pooled specifiers
///
/// Taken under the read lock; later pool mutations are not reflected.
pub struct SpecSnapshot(std::vec::IntoIter<Arc<dyn Specifier>>);

impl Iterator for SpecSnapshot {
    type Item = Arc<dyn Specifier>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl ExactSizeIterator for SpecSnapshot {}
