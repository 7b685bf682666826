//! Connect and flush

use std::sync::Arc;

use dbpools_core::{Database, DbPoolError, Result, Specifier};

use super::server_pool::{ServerPool, WriteSlots};

/// Return the pooled handle for `spec`, creating or retuning it as needed.
///
/// Handles are created only under the write lock after re-checking the
/// slot, so concurrent callers for one identity share a single creation.
/// A failed creation leaves the slot absent; a failed update leaves the
/// previous handle pooled. Neither is retried here.
#[tracing::instrument(skip(pool, spec), fields(kind = %pool.kind(), server = %spec.unique_server()))]
pub async fn connect(pool: &ServerPool, spec: Arc<dyn Specifier>) -> Result<Arc<dyn Database>> {
    let id = spec.unique_server();

    {
        let slots = pool.read().await;
        if let Some(db) = slots.get(&id) {
            if !db.spec().needs_update(spec.as_ref()) {
                tracing::trace!("reusing pooled handle");
                return Ok(db);
            }
        }
    }

    let mut slots = pool.write().await;
    ensure_locked(&mut slots, &id, spec).await
}

/// Second half of [`connect`], run under the write lock
async fn ensure_locked(
    slots: &mut WriteSlots<'_>,
    id: &str,
    spec: Arc<dyn Specifier>,
) -> Result<Arc<dyn Database>> {
    let kind = spec.kind();

    if let Some(db) = slots.get(id) {
        // Another caller may have retuned it while we waited for the lock
        if db.spec().needs_update(spec.as_ref()) {
            db.update(spec).await.map_err(|e| {
                let err = e.into_update(kind, id);
                tracing::error!(error = %err, "failed to update pooled handle");
                err
            })?;
            tracing::debug!("updated pooled handle");
        }
        return Ok(db);
    }

    let db = spec.new_db().await.map_err(|e| {
        let err = e.into_connect(kind, id);
        tracing::error!(error = %err, "failed to open handle");
        err
    })?;

    slots.put(id, db);
    let db = slots.get(id).ok_or_else(|| {
        DbPoolError::Internal(format!("new {kind} handle not found for {id}"))
    })?;

    tracing::info!("opened new handle");
    Ok(db)
}

/// Evict the handle for `spec` and close it.
///
/// Returns whether a handle was pooled. Callers still holding the handle
/// keep it alive until they drop it, but it is closed.
#[tracing::instrument(skip(pool, spec), fields(kind = %pool.kind(), server = %spec.unique_server()))]
pub async fn flush_entry(pool: &ServerPool, spec: &dyn Specifier) -> Result<bool> {
    let id = spec.unique_server();
    let mut slots = pool.write().await;

    match slots.delete(&id) {
        Some(db) => {
            db.close().await?;
            tracing::info!("evicted handle");
            Ok(true)
        }
        None => {
            tracing::trace!("no pooled handle to evict");
            Ok(false)
        }
    }
}
