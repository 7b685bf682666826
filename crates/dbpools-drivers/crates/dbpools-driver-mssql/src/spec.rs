//! SQL Server specifier and connection manager

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbpools_core::{
    BackendKind, CanonicalParams, ConfigErrors, Database, DbPoolError, ManagedDb, ManagedSpec,
    PoolLimits, Result, SharedSpec, Specifier, report_kind_mismatch,
};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use serde::{Deserialize, Serialize};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// A SQL Server handle
pub type SqlServerDb = ManagedDb<SqlServerSpec>;

/// A pooled tiberius client
pub type SqlServerClient = Client<Compat<TcpStream>>;

/// Default SQL Server port
pub const DEFAULT_PORT: u16 = 1433;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// TLS negotiation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encrypt {
    /// Encrypt the whole session
    On,
    /// Encrypt the login packet only
    Off,
    /// No TLS at all
    Disable,
}

impl Encrypt {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "true" => Some(Self::On),
            "false" => Some(Self::Off),
            "disable" => Some(Self::Disable),
            _ => None,
        }
    }

    fn level(self) -> EncryptionLevel {
        match self {
            Self::On => EncryptionLevel::Required,
            Self::Off => EncryptionLevel::Off,
            Self::Disable => EncryptionLevel::NotSupported,
        }
    }
}

/// SQL Server connection parameters
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlServerParams {
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(rename = "user id", default)]
    pub user_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    /// Connect timeout in seconds; 0 for none
    #[serde(rename = "connection timeout", default)]
    pub timeout: u64,
    /// `true`, `false` or `disable`; empty keeps the driver default
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encrypt: String,
}

impl SqlServerParams {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        user_id: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            user_id: user_id.into(),
            password: password.into(),
            database: database.into(),
            schema: String::new(),
            timeout: 0,
            encrypt: String::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_encrypt(mut self, encrypt: impl Into<String>) -> Self {
        self.encrypt = encrypt.into();
        self
    }

    /// Validate and return the parsed encryption mode
    fn validate(&self) -> Result<Option<Encrypt>> {
        let mut errors = ConfigErrors::new("sqlserver");
        errors.require_port("port", self.port);
        errors.require("user id", &self.user_id);
        errors.require("password", &self.password);
        errors.require("database", &self.database);
        errors.require("server", &self.server);

        let encrypt = if self.encrypt.is_empty() {
            None
        } else {
            let parsed = Encrypt::parse(&self.encrypt);
            if parsed.is_none() {
                errors.push(format!("bad value {:?} for \"encrypt\"", self.encrypt));
            }
            parsed
        };

        errors.finish()?;
        Ok(encrypt)
    }
}

impl fmt::Debug for SqlServerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlServerParams")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("timeout", &self.timeout)
            .field("encrypt", &self.encrypt)
            .finish()
    }
}

/// Specifier for a SQL Server database
///
/// Tunables are max open / max idle, the connect timeout, `encrypt` and
/// `schema`.
#[derive(Debug, Clone)]
pub struct SqlServerSpec {
    params: SqlServerParams,
    encrypt: Option<Encrypt>,
    limits: PoolLimits,
}

impl SqlServerSpec {
    /// Validate the parameters and build a specifier
    pub fn new(params: SqlServerParams, limits: PoolLimits) -> Result<Self> {
        let encrypt = params.validate()?;
        Ok(Self {
            params,
            encrypt,
            limits,
        })
    }

    pub fn params(&self) -> &SqlServerParams {
        &self.params
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    pub fn encrypt(&self) -> Option<Encrypt> {
        self.encrypt
    }

    /// Schema callers qualify object names with, if set
    ///
    /// SQL Server has no per-session default schema, so this never reaches
    /// the driver config. Retuning it swaps the handle's specifier and
    /// callers pick it up through [`SqlServerSpec::qualify`].
    pub fn schema(&self) -> Option<&str> {
        Some(self.params.schema.as_str()).filter(|s| !s.is_empty())
    }

    /// Qualify `object` with the schema as `[schema].[object]`; unqualified
    /// when no schema is set
    pub fn qualify(&self, object: &str) -> String {
        let object = quote_identifier(object);
        match self.schema() {
            Some(schema) => format!("{}.{object}", quote_identifier(schema)),
            None => object,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.params.timeout > 0).then(|| Duration::from_secs(self.params.timeout))
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }

    pub(crate) fn config(&self) -> Config {
        let p = &self.params;
        let mut config = Config::new();
        config.host(&p.server);
        config.port(p.port);
        config.database(&p.database);
        config.authentication(AuthMethod::sql_server(&p.user_id, &p.password));
        if let Some(encrypt) = self.encrypt {
            config.encryption(encrypt.level());
        }
        config
    }
}

fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

#[async_trait]
impl Specifier for SqlServerSpec {
    fn kind(&self) -> BackendKind {
        BackendKind::SqlServer
    }

    fn connection_string(&self) -> String {
        let p = &self.params;
        let mut params = CanonicalParams::new();
        params
            .insert("server", p.server.as_str())
            .insert("port", p.port.to_string())
            .insert("user id", p.user_id.as_str())
            .insert("password", p.password.as_str())
            .insert("database", p.database.as_str());
        if !p.schema.is_empty() {
            params.insert("schema", p.schema.as_str());
        }
        if p.timeout > 0 {
            params.insert("timeout", p.timeout.to_string());
        }
        if !p.encrypt.is_empty() {
            params.insert("encrypt", p.encrypt.as_str());
        }
        params.join(";")
    }

    fn unique_server(&self) -> String {
        let p = &self.params;
        let mut params = CanonicalParams::new();
        params
            .insert("host", p.server.as_str())
            .insert("port", p.port.to_string())
            .insert("user id", p.user_id.as_str())
            .insert("database", p.database.as_str())
            .insert_secret("password", &p.password);
        params.join(";")
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        match other.as_any().downcast_ref::<SqlServerSpec>() {
            Some(other) => {
                other.limits != self.limits
                    || other.params.timeout != self.params.timeout
                    || other.encrypt != self.encrypt
                    || other.params.schema != self.params.schema
            }
            None => {
                report_kind_mismatch(self.kind(), other.kind());
                true
            }
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        Ok(Arc::new(SqlServerDb::open(self).await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ManagedSpec for SqlServerSpec {
    type Manager = SqlServerManager;

    fn limits(&self) -> PoolLimits {
        self.limits
    }

    fn manager(spec: SharedSpec<Self>) -> SqlServerManager {
        SqlServerManager { spec }
    }
}

/// Deadpool manager for tiberius clients
pub struct SqlServerManager {
    spec: SharedSpec<SqlServerSpec>,
}

fn mssql_error(err: tiberius::error::Error) -> DbPoolError {
    DbPoolError::Driver(format!("sqlserver: {err}"))
}

async fn connect_client(config: Config) -> Result<SqlServerClient> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| DbPoolError::Driver(format!("sqlserver: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| DbPoolError::Driver(format!("sqlserver: {e}")))?;
    Client::connect(config, tcp.compat_write())
        .await
        .map_err(mssql_error)
}

impl managed::Manager for SqlServerManager {
    type Type = SqlServerClient;
    type Error = DbPoolError;

    async fn create(&self) -> std::result::Result<SqlServerClient, DbPoolError> {
        let (config, timeout) = {
            let spec = self.spec.read();
            (spec.config(), spec.timeout())
        };

        let client = match timeout {
            Some(limit) => tokio::time::timeout(limit, connect_client(config))
                .await
                .map_err(|_| {
                    DbPoolError::Driver(format!("sqlserver: connect timed out after {limit:?}"))
                })??,
            None => connect_client(config).await?,
        };

        tracing::debug!("sqlserver connection established");
        Ok(client)
    }

    async fn recycle(
        &self,
        client: &mut SqlServerClient,
        _: &Metrics,
    ) -> RecycleResult<DbPoolError> {
        client
            .execute("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| RecycleError::Backend(mssql_error(e)))
    }
}
