//! MongoDB handle and sessions

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use dbpools_core::{BackendKind, Database, DbPoolError, Result, Specifier, downcast_spec};
use mongodb::Client;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::MongoSpec;

fn mongo_error(err: mongodb::error::Error) -> DbPoolError {
    DbPoolError::Driver(format!("mongodb: {err}"))
}

/// A MongoDB handle
///
/// Sessions are independent copies of the client that count against the
/// session limit until dropped.
pub struct MongoDb {
    client: Client,
    sessions: Arc<Semaphore>,
    limit: Mutex<usize>,
    spec: RwLock<Arc<MongoSpec>>,
}

impl MongoDb {
    /// Connect and verify the deployment answers a ping
    #[tracing::instrument(skip(spec), fields(server = %spec.unique_server()))]
    pub async fn open(spec: Arc<MongoSpec>) -> Result<Self> {
        let mut options = ClientOptions::parse(spec.connection_string())
            .await
            .map_err(mongo_error)?;
        // 0 lifts the client's own cap; sessions are bounded by the semaphore
        options.max_pool_size = Some(0);
        let client = Client::with_options(options).map_err(mongo_error)?;

        if let Err(e) = client.database("admin").run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(mongo_error(e));
        }

        tracing::debug!(limit = spec.limit(), "mongodb client opened");
        Ok(Self::with_client(client, spec))
    }

    pub(crate) fn with_client(client: Client, spec: Arc<MongoSpec>) -> Self {
        let limit = spec.limit();
        Self {
            client,
            sessions: Arc::new(Semaphore::new(limit)),
            limit: Mutex::new(limit),
            spec: RwLock::new(spec),
        }
    }

    /// Wait for a free session slot and hand out a session
    pub async fn session(&self) -> Result<MongoSession> {
        let permit = Arc::clone(&self.sessions)
            .acquire_owned()
            .await
            .map_err(|_| DbPoolError::Closed("mongodb handle is closed".into()))?;
        Ok(self.new_session(permit))
    }

    /// Hand out a session if a slot is free right now
    pub fn try_session(&self) -> Option<MongoSession> {
        let permit = Arc::clone(&self.sessions).try_acquire_owned().ok()?;
        Some(self.new_session(permit))
    }

    /// Current session limit
    pub fn limit(&self) -> usize {
        *self.limit.lock()
    }

    /// Session slots free right now
    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    fn new_session(&self, permit: OwnedSemaphorePermit) -> MongoSession {
        MongoSession {
            client: self.client.clone(),
            database: self.spec.read().params().database.clone(),
            _permit: permit,
        }
    }

    /// Take `by` slots out of circulation. Slots held by live sessions are
    /// reclaimed as those sessions end.
    fn shrink(&self, by: usize) {
        let owed = by - self.sessions.forget_permits(by);
        if owed == 0 {
            return;
        }
        let Ok(owed) = u32::try_from(owed) else {
            tracing::warn!(owed, "session limit shrink too large, ignoring remainder");
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            if let Ok(permits) = sessions.acquire_many_owned(owed).await {
                permits.forget();
            }
        });
    }
}

#[async_trait]
impl Database for MongoDb {
    fn spec(&self) -> Arc<dyn Specifier> {
        self.spec.read().clone()
    }

    #[tracing::instrument(skip(self, spec), fields(server = %spec.unique_server()))]
    async fn update(&self, spec: Arc<dyn Specifier>) -> Result<()> {
        let next = downcast_spec::<MongoSpec>(&spec).ok_or(DbPoolError::KindMismatch {
            expected: BackendKind::MongoDb,
            found: spec.kind(),
        })?;

        {
            let mut limit = self.limit.lock();
            let wanted = next.limit();
            if wanted > *limit {
                self.sessions.add_permits(wanted - *limit);
            } else if wanted < *limit {
                self.shrink(*limit - wanted);
            }
            *limit = wanted;
        }
        *self.spec.write() = next;

        tracing::debug!(limit = self.limit(), "session limit updated");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.sessions.close();
        self.client.clone().shutdown().await;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A session on a MongoDB handle. Dropping it frees its slot.
pub struct MongoSession {
    client: Client,
    database: String,
    _permit: OwnedSemaphorePermit,
}

impl MongoSession {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The database named by the handle's specifier
    pub fn database(&self) -> mongodb::Database {
        self.client.database(&self.database)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dbpools_core::testing::MockSpec;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{MongoHost, MongoParams};

    fn spec(limit: usize) -> Arc<MongoSpec> {
        let params = MongoParams::new([MongoHost::new("localhost", 27017)], "app", "pw", "orders");
        Arc::new(MongoSpec::new(params, limit).unwrap())
    }

    fn retune(limit: usize) -> Arc<dyn Specifier> {
        spec(limit)
    }

    /// Clients connect lazily, so no server is needed until an operation runs
    async fn handle(limit: usize) -> MongoDb {
        let options = ClientOptions::parse("mongodb://localhost:27017")
            .await
            .unwrap();
        MongoDb::with_client(Client::with_options(options).unwrap(), spec(limit))
    }

    async fn wait_for_available(db: &MongoDb, expected: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while db.available_sessions() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_sessions_respect_limit() {
        let db = handle(2).await;
        let first = db.session().await.unwrap();
        let second = db.try_session().unwrap();
        assert!(db.try_session().is_none());
        assert_eq!(first.database().name(), "orders");

        drop(second);
        assert!(db.try_session().is_some());
        drop(first);
        assert_eq!(db.available_sessions(), 2);
    }

    #[tokio::test]
    async fn test_update_grows_limit() {
        let db = handle(1).await;
        let _held = db.session().await.unwrap();
        assert!(db.try_session().is_none());

        db.update(retune(3)).await.unwrap();
        assert_eq!(db.limit(), 3);
        assert_eq!(db.available_sessions(), 2);
        assert_eq!(
            db.spec().as_any().downcast_ref::<MongoSpec>().unwrap().limit(),
            3
        );
    }

    #[tokio::test]
    async fn test_update_shrinks_after_sessions_end() {
        let db = handle(3).await;
        let a = db.session().await.unwrap();
        let b = db.session().await.unwrap();

        db.update(retune(1)).await.unwrap();
        assert_eq!(db.limit(), 1);
        assert_eq!(db.available_sessions(), 0);

        drop(a);
        drop(b);
        wait_for_available(&db, 1).await;
    }

    #[tokio::test]
    async fn test_update_rejects_other_kinds() {
        let db = handle(1).await;
        let other = MockSpec::new(BackendKind::Redis, "cache").into_arc();
        let err = db.update(other).await.unwrap_err();
        assert!(matches!(err, DbPoolError::KindMismatch { .. }));
        assert_eq!(db.limit(), 1);
    }

    #[tokio::test]
    async fn test_close_refuses_new_sessions() {
        let db = handle(2).await;
        db.close().await.unwrap();
        assert!(matches!(db.session().await, Err(DbPoolError::Closed(_))));
    }

}
