//! MongoDB specifier

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dbpools_core::{
    BackendKind, ConfigErrors, DEFAULT_MONGO_POOL_LIMIT, Database, Result, Specifier,
    encode_userinfo, fingerprint, report_kind_mismatch,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::MongoDb;

/// One member of a replica set or a standalone server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoHost {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl MongoHost {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// MongoDB connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoParams {
    #[serde(default)]
    pub hosts: Vec<MongoHost>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

impl MongoParams {
    pub fn new(
        hosts: impl IntoIterator<Item = MongoHost>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut errors = ConfigErrors::new("mongodb");
        if self.hosts.is_empty() {
            errors.push("at least one host must be defined");
        }
        for (i, host) in self.hosts.iter().enumerate() {
            if host.host.is_empty() {
                errors.push(format!("host name is required for host {i}"));
            } else if host.port == 0 {
                errors.push(format!("port is required for host {:?}", host.host));
            }
        }
        errors.require("username", &self.username);
        errors.require("password", &self.password);
        errors.require("database", &self.database);
        errors.finish()
    }

    /// `mongodb://` URL with `password` rendered by `password_fn`
    fn url(&self, password_fn: impl Fn(&str) -> String) -> String {
        let hosts = self
            .hosts
            .iter()
            .map(|h| format!("{}:{}", h.host, h.port))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "mongodb://{}:{}@{}/{}",
            encode_userinfo(&self.username),
            password_fn(&self.password),
            hosts,
            self.database
        )
    }
}

impl fmt::Debug for MongoParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoParams")
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Specifier for a MongoDB deployment
///
/// The only tunable is the session limit.
#[derive(Debug, Clone)]
pub struct MongoSpec {
    params: MongoParams,
    limit: usize,
}

impl MongoSpec {
    /// Validate the parameters and build a specifier. A `limit` of 0 selects
    /// [`DEFAULT_MONGO_POOL_LIMIT`]; the largest accepted limit is
    /// [`Semaphore::MAX_PERMITS`].
    pub fn new(params: MongoParams, limit: usize) -> Result<Self> {
        params.validate()?;
        if limit > Semaphore::MAX_PERMITS {
            let mut errors = ConfigErrors::new("mongodb");
            errors.push(format!(
                "bad value {limit} for \"limit\" (at most {})",
                Semaphore::MAX_PERMITS
            ));
            errors.finish()?;
        }
        let limit = if limit == 0 {
            DEFAULT_MONGO_POOL_LIMIT
        } else {
            limit
        };
        Ok(Self { params, limit })
    }

    pub fn params(&self) -> &MongoParams {
        &self.params
    }

    /// Maximum number of concurrent sessions
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }
}

#[async_trait]
impl Specifier for MongoSpec {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    fn connection_string(&self) -> String {
        self.params.url(encode_userinfo)
    }

    fn unique_server(&self) -> String {
        self.params.url(fingerprint)
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        match other.as_any().downcast_ref::<MongoSpec>() {
            Some(other) => other.limit != self.limit,
            None => {
                report_kind_mismatch(self.kind(), other.kind());
                true
            }
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        Ok(Arc::new(MongoDb::open(self).await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
