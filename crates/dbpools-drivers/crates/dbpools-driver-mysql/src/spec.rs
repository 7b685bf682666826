//! MySQL specifier and connection manager

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbpools_core::{
    BackendKind, ConfigErrors, Database, DbPoolError, ManagedDb, ManagedSpec, PoolLimits, Result,
    SharedSpec, Specifier, encode_userinfo, fingerprint, parse_duration, report_kind_mismatch,
};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use mysql_async::prelude::Queryable as _;
use mysql_async::{Conn, Opts, OptsBuilder};
use serde::{Deserialize, Serialize};

/// A MySQL handle
pub type MySqlDb = ManagedDb<MySqlSpec>;

/// MySQL connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MySqlParams {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub dbname: String,
    /// Connection attempt timeout, e.g. `90s`; empty for none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,
}

impl MySqlParams {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server: server.into(),
            port,
            dbname: dbname.into(),
            timeout: String::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Validate and return the parsed timeout
    fn validate(&self) -> Result<Option<Duration>> {
        let mut errors = ConfigErrors::new("mysql");
        errors.require_port("port", self.port);
        errors.require("username", &self.username);
        errors.require("password", &self.password);
        errors.require("dbname", &self.dbname);
        errors.require("server", &self.server);

        let mut timeout = None;
        if !self.timeout.is_empty() {
            match parse_duration(&self.timeout) {
                Ok(parsed) => timeout = Some(parsed),
                Err(e) => errors.push(format!(
                    "bad value {:?} for \"timeout\" ({e})",
                    self.timeout
                )),
            }
        }

        errors.finish()?;
        Ok(timeout)
    }
}

impl fmt::Debug for MySqlParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlParams")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Specifier for a MySQL database
///
/// Tunables are max open / max idle and the connect timeout.
#[derive(Debug, Clone)]
pub struct MySqlSpec {
    params: MySqlParams,
    timeout: Option<Duration>,
    limits: PoolLimits,
}

impl MySqlSpec {
    /// Validate the parameters and build a specifier
    pub fn new(params: MySqlParams, limits: PoolLimits) -> Result<Self> {
        let timeout = params.validate()?;
        Ok(Self {
            params,
            timeout,
            limits,
        })
    }

    pub fn params(&self) -> &MySqlParams {
        &self.params
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Parsed connect timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }

    fn opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.params.server.clone())
            .tcp_port(self.params.port)
            .user(Some(self.params.username.clone()))
            .pass(Some(self.params.password.clone()))
            .db_name(Some(self.params.dbname.clone()))
            .into()
    }
}

#[async_trait]
impl Specifier for MySqlSpec {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    /// `mysql://` URL as `mysql_async` reads it. The connect timeout is not
    /// a URL parameter there; the manager applies it around the connect.
    fn connection_string(&self) -> String {
        let p = &self.params;
        format!(
            "mysql://{}:{}@{}:{}/{}",
            encode_userinfo(&p.username),
            encode_userinfo(&p.password),
            p.server,
            p.port,
            p.dbname
        )
    }

    fn unique_server(&self) -> String {
        let p = &self.params;
        format!(
            "{}:{}@tcp({}:{})/{}",
            p.username,
            fingerprint(&p.password),
            p.server,
            p.port,
            p.dbname
        )
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        match other.as_any().downcast_ref::<MySqlSpec>() {
            Some(other) => other.limits != self.limits || other.timeout != self.timeout,
            None => {
                report_kind_mismatch(self.kind(), other.kind());
                true
            }
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        Ok(Arc::new(MySqlDb::open(self).await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ManagedSpec for MySqlSpec {
    type Manager = MySqlManager;

    fn limits(&self) -> PoolLimits {
        self.limits
    }

    fn manager(spec: SharedSpec<Self>) -> MySqlManager {
        MySqlManager { spec }
    }
}

/// Deadpool manager for `mysql_async` connections
pub struct MySqlManager {
    spec: SharedSpec<MySqlSpec>,
}

fn mysql_error(err: mysql_async::Error) -> DbPoolError {
    DbPoolError::Driver(format!("mysql: {err}"))
}

impl managed::Manager for MySqlManager {
    type Type = Conn;
    type Error = DbPoolError;

    async fn create(&self) -> std::result::Result<Conn, DbPoolError> {
        let (opts, timeout) = {
            let spec = self.spec.read();
            (spec.opts(), spec.timeout)
        };

        let conn = match timeout {
            Some(limit) => tokio::time::timeout(limit, Conn::new(opts))
                .await
                .map_err(|_| DbPoolError::Driver(format!("mysql: connect timed out after {limit:?}")))?,
            None => Conn::new(opts).await,
        }
        .map_err(mysql_error)?;

        tracing::debug!("mysql connection established");
        Ok(conn)
    }

    async fn recycle(&self, conn: &mut Conn, _: &Metrics) -> RecycleResult<DbPoolError> {
        conn.ping()
            .await
            .map_err(|e| RecycleError::Backend(mysql_error(e)))
    }
}
