//! Redis specifier and connection manager

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dbpools_core::{
    BackendKind, ConfigErrors, Database, DbPoolError, ManagedDb, ManagedSpec, PoolLimits, Result,
    SharedSpec, Specifier, encode_userinfo, fingerprint, report_kind_mismatch,
};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};

/// A Redis handle
pub type RedisDb = ManagedDb<RedisSpec>;

/// Redis connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisParams {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// Logical database number; empty selects the default database
    #[serde(default)]
    pub database: String,
}

impl RedisParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            host: host.into(),
            port,
            database: String::new(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    fn validate(&self) -> Result<()> {
        let mut errors = ConfigErrors::new("redis");
        errors.require("host", &self.host);
        errors.require_port("port", self.port);
        if !self.database.is_empty() && self.database.parse::<u32>().is_err() {
            errors.push(format!("bad value {:?} for \"database\"", self.database));
        }
        errors.finish()
    }

    /// `redis://` URL with `password` rendered by `password_fn`
    fn url(&self, password_fn: impl Fn(&str) -> String) -> String {
        let mut url = String::from("redis://");
        if !self.username.is_empty() || !self.password.is_empty() {
            url.push_str(&encode_userinfo(&self.username));
            if !self.password.is_empty() {
                url.push(':');
                url.push_str(&password_fn(&self.password));
            }
            url.push('@');
        }
        url.push_str(&format!("{}:{}", self.host, self.port));
        if !self.database.is_empty() {
            url.push('/');
            url.push_str(&self.database);
        }
        url
    }
}

impl fmt::Debug for RedisParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisParams")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

/// Specifier for a Redis server
///
/// Tunables are max active (pool size, 0 for the default) and max idle.
#[derive(Debug, Clone)]
pub struct RedisSpec {
    params: RedisParams,
    limits: PoolLimits,
}

impl RedisSpec {
    /// Validate the parameters and build a specifier
    pub fn new(params: RedisParams, limits: PoolLimits) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, limits })
    }

    pub fn params(&self) -> &RedisParams {
        &self.params
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }
}

#[async_trait]
impl Specifier for RedisSpec {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn connection_string(&self) -> String {
        self.params.url(encode_userinfo)
    }

    fn unique_server(&self) -> String {
        self.params.url(fingerprint)
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        match other.as_any().downcast_ref::<RedisSpec>() {
            Some(other) => other.limits != self.limits,
            None => {
                report_kind_mismatch(self.kind(), other.kind());
                true
            }
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        Ok(Arc::new(RedisDb::open(self).await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ManagedSpec for RedisSpec {
    type Manager = RedisManager;

    fn limits(&self) -> PoolLimits {
        self.limits
    }

    fn manager(spec: SharedSpec<Self>) -> RedisManager {
        RedisManager { spec }
    }
}

/// Deadpool manager for multiplexed Redis connections
pub struct RedisManager {
    spec: SharedSpec<RedisSpec>,
}

fn redis_error(err: redis::RedisError) -> DbPoolError {
    DbPoolError::Driver(format!("redis: {err}"))
}

impl managed::Manager for RedisManager {
    type Type = MultiplexedConnection;
    type Error = DbPoolError;

    async fn create(&self) -> std::result::Result<MultiplexedConnection, DbPoolError> {
        let url = self.spec.read().connection_string();
        let client = redis::Client::open(url.as_str()).map_err(redis_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;
        tracing::debug!("redis connection established");
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut MultiplexedConnection,
        _: &Metrics,
    ) -> RecycleResult<DbPoolError> {
        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(conn).await;
        match pong {
            Ok(_) => Ok(()),
            Err(e) => Err(RecycleError::Backend(redis_error(e))),
        }
    }
}
