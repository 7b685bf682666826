//! PostgreSQL specifier and connection manager

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbpools_core::{
    BackendKind, CanonicalParams, ConfigErrors, Database, DbPoolError, ManagedDb, ManagedSpec,
    PoolLimits, Result, SharedSpec, Specifier, report_kind_mismatch,
};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde::Deserialize;
use tokio_postgres::{Client, NoTls};

/// A PostgreSQL handle
pub type PostgresDb = ManagedDb<PostgresSpec>;

/// Keywords accepted in a connection map
const KEYWORDS: &[&str] = &[
    "connect_timeout",
    "dbname",
    "host",
    "password",
    "port",
    "sslmode",
    "user",
];

/// Keywords that must be present and non-empty
const REQUIRED: &[&str] = &["dbname", "host", "port", "user"];

/// Keywords left out of the server identity
const TUNING_KEYWORDS: &[&str] = &["connect_timeout"];

/// libpq `sslmode` values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "disable" => Some(Self::Disable),
            "allow" => Some(Self::Allow),
            "prefer" => Some(Self::Prefer),
            "require" => Some(Self::Require),
            "verify-ca" => Some(Self::VerifyCa),
            "verify-full" => Some(Self::VerifyFull),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    /// The closest mode tokio-postgres negotiates. Certificate checks for
    /// the verify modes happen in the TLS connector.
    pub fn driver_mode(self) -> tokio_postgres::config::SslMode {
        use tokio_postgres::config::SslMode as Driver;
        match self {
            Self::Disable => Driver::Disable,
            Self::Allow | Self::Prefer => Driver::Prefer,
            Self::Require | Self::VerifyCa | Self::VerifyFull => Driver::Require,
        }
    }

    /// TLS connector for this mode, `None` when TLS is disabled
    ///
    /// `verify-ca` and `verify-full` check the certificate chain; only
    /// `verify-full` checks the host name.
    pub fn tls_connector(self) -> Result<Option<MakeTlsConnector>> {
        if self == Self::Disable {
            return Ok(None);
        }
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(!matches!(self, Self::VerifyCa | Self::VerifyFull))
            .danger_accept_invalid_hostnames(self != Self::VerifyFull)
            .build()
            .map_err(|e| {
                DbPoolError::Driver(format!("postgres: failed to build TLS connector: {e}"))
            })?;
        Ok(Some(MakeTlsConnector::new(connector)))
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL connection map (libpq keywords to values)
///
/// Scalar JSON values are accepted and stringified, so `"port": 5432` and
/// `"port": "5432"` are equivalent.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, serde_json::Value>")]
pub struct PostgresParams {
    params: BTreeMap<String, String>,
}

impl PostgresParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a keyword
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = ConfigErrors::new("postgres");
        for key in REQUIRED {
            errors.require(key, self.get(key).unwrap_or_default());
        }
        if let Some(port) = self.get("port") {
            if !port.is_empty() && port.parse::<u16>().is_err() {
                errors.push(format!("bad value {port:?} for \"port\""));
            }
        }
        if let Some(timeout) = self.get("connect_timeout") {
            if timeout.parse::<u64>().is_err() {
                errors.push(format!("bad value {timeout:?} for \"connect_timeout\""));
            }
        }
        if let Some(mode) = self.get("sslmode") {
            if !mode.is_empty() && SslMode::parse(mode).is_none() {
                errors.push(format!("bad value {mode:?} for \"sslmode\""));
            }
        }
        for key in self.params.keys() {
            if !KEYWORDS.contains(&key.as_str()) {
                errors.push(format!("unexpected key {key:?}"));
            }
        }
        errors.finish()
    }
}

impl TryFrom<BTreeMap<String, serde_json::Value>> for PostgresParams {
    type Error = String;

    fn try_from(map: BTreeMap<String, serde_json::Value>) -> std::result::Result<Self, String> {
        let mut params = BTreeMap::new();
        for (key, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => return Err(format!("unsupported value {other} for {key:?}")),
            };
            params.insert(key, value);
        }
        Ok(Self { params })
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for PostgresParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |params, (k, v)| params.with(k, v))
    }
}

impl fmt::Debug for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.params {
            if key == "password" {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// Specifier for a PostgreSQL database
///
/// Tunables are max open / max idle and `connect_timeout`.
#[derive(Debug, Clone)]
pub struct PostgresSpec {
    params: PostgresParams,
    limits: PoolLimits,
}

impl PostgresSpec {
    /// Validate the connection map and build a specifier
    pub fn new(params: PostgresParams, limits: PoolLimits) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, limits })
    }

    pub fn params(&self) -> &PostgresParams {
        &self.params
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// `sslmode`, defaulting to `prefer` when unset
    pub fn ssl_mode(&self) -> SslMode {
        self.params
            .get("sslmode")
            .and_then(SslMode::parse)
            .unwrap_or_default()
    }

    /// Driver configuration built from the connection map
    pub fn config(&self) -> Result<tokio_postgres::Config> {
        let p = &self.params;
        let mut config = tokio_postgres::Config::new();
        config
            .host(p.get("host").unwrap_or_default())
            .dbname(p.get("dbname").unwrap_or_default())
            .user(p.get("user").unwrap_or_default())
            .ssl_mode(self.ssl_mode().driver_mode());

        if let Some(port) = p.get("port") {
            let port = port.parse::<u16>().map_err(|_| {
                DbPoolError::Configuration(format!("bad value {port:?} for \"port\""))
            })?;
            config.port(port);
        }
        if let Some(password) = p.get("password") {
            config.password(password);
        }
        // 0 means wait indefinitely, as in libpq
        if let Some(secs) = p.get("connect_timeout").and_then(|t| t.parse::<u64>().ok()) {
            if secs > 0 {
                config.connect_timeout(Duration::from_secs(secs));
            }
        }
        Ok(config)
    }

    pub fn into_arc(self) -> Arc<dyn Specifier> {
        Arc::new(self)
    }
}

#[async_trait]
impl Specifier for PostgresSpec {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn connection_string(&self) -> String {
        self.params
            .params
            .iter()
            .collect::<CanonicalParams>()
            .to_keyword_string()
    }

    fn unique_server(&self) -> String {
        let mut canonical = CanonicalParams::new();
        for (key, value) in &self.params.params {
            if TUNING_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            if key == "password" {
                canonical.insert_secret(key.as_str(), value);
            } else {
                canonical.insert(key.as_str(), value.as_str());
            }
        }
        canonical.to_keyword_string()
    }

    fn needs_update(&self, other: &dyn Specifier) -> bool {
        match other.as_any().downcast_ref::<PostgresSpec>() {
            Some(other) => {
                other.limits != self.limits
                    || other.params.get("connect_timeout") != self.params.get("connect_timeout")
            }
            None => {
                report_kind_mismatch(self.kind(), other.kind());
                true
            }
        }
    }

    async fn new_db(self: Arc<Self>) -> Result<Arc<dyn Database>> {
        Ok(Arc::new(PostgresDb::open(self).await?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl ManagedSpec for PostgresSpec {
    type Manager = PostgresManager;

    fn limits(&self) -> PoolLimits {
        self.limits
    }

    fn manager(spec: SharedSpec<Self>) -> PostgresManager {
        PostgresManager { spec }
    }
}

/// Deadpool manager for tokio-postgres clients
pub struct PostgresManager {
    spec: SharedSpec<PostgresSpec>,
}

fn pg_error(err: tokio_postgres::Error) -> DbPoolError {
    DbPoolError::Driver(format!("postgres: {err}"))
}

/// Run a connection's I/O until it ends
fn drive<F>(connection: F)
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection error");
        }
    });
}

impl managed::Manager for PostgresManager {
    type Type = Client;
    type Error = DbPoolError;

    async fn create(&self) -> std::result::Result<Client, DbPoolError> {
        let (config, ssl_mode) = {
            let spec = self.spec.read();
            (spec.config()?, spec.ssl_mode())
        };

        let client = match ssl_mode.tls_connector()? {
            Some(tls) => {
                let (client, connection) = config.connect(tls).await.map_err(pg_error)?;
                drive(connection);
                client
            }
            None => {
                let (client, connection) = config.connect(NoTls).await.map_err(pg_error)?;
                drive(connection);
                client
            }
        };

        tracing::debug!(ssl_mode = %ssl_mode, "postgres connection established");
        Ok(client)
    }

    async fn recycle(&self, client: &mut Client, _: &Metrics) -> RecycleResult<DbPoolError> {
        if client.is_closed() {
            return Err(RecycleError::Backend(DbPoolError::Closed(
                "postgres connection closed".into(),
            )));
        }
        client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| RecycleError::Backend(pg_error(e)))
    }
}
