//! Endpoint records and their resolution into specifiers

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{BackendKind, DbPoolError, PoolLimits, PoolsConfig, Result, Specifier};

/// A stored remote-endpoint row as delivered by change notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: i64,
    #[serde(default)]
    pub api_id: i64,
    /// Backend kind name, e.g. `postgres` or `mongodb`
    #[serde(rename = "type")]
    pub kind: String,
    /// Backend-specific connection data
    #[serde(default)]
    pub data: serde_json::Value,
}

impl EndpointRecord {
    pub fn new(id: i64, kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id,
            api_id: 0,
            kind: kind.into(),
            data,
        }
    }

    pub fn with_api_id(mut self, api_id: i64) -> Self {
        self.api_id = api_id;
        self
    }
}

/// Connection data of an endpoint record: backend parameters under `config`
/// plus the tunables each backend understands.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointData<C> {
    pub config: C,
    #[serde(default)]
    pub max_open_conn: Option<usize>,
    #[serde(default)]
    pub max_idle_conn: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub max_active: Option<usize>,
    #[serde(default)]
    pub max_idle: Option<usize>,
}

impl<C: DeserializeOwned> EndpointData<C> {
    /// Decode endpoint data, reporting the backend it was meant for
    pub fn from_value(kind: BackendKind, value: &serde_json::Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| {
            DbPoolError::Configuration(format!("{kind} endpoint data: {e}"))
        })
    }
}

impl<C> EndpointData<C> {
    /// `maxOpenConn` / `maxIdleConn`, falling back to the SQL defaults
    pub fn sql_limits(&self, defaults: &PoolsConfig) -> PoolLimits {
        PoolLimits::new(
            self.max_open_conn.unwrap_or(defaults.sql.max_open()),
            self.max_idle_conn.unwrap_or(defaults.sql.max_idle()),
        )
    }

    /// `maxActive` / `maxIdle`, falling back to the Redis defaults
    pub fn redis_limits(&self, defaults: &PoolsConfig) -> PoolLimits {
        PoolLimits::new(
            self.max_active.unwrap_or(defaults.redis.max_open()),
            self.max_idle.unwrap_or(defaults.redis.max_idle()),
        )
    }

    /// Session `limit`, falling back to the MongoDB default
    pub fn mongo_limit(&self, defaults: &PoolsConfig) -> usize {
        self.limit.filter(|&n| n > 0).unwrap_or(defaults.mongo_limit())
    }
}

/// Per-kind factory turning endpoint data into a specifier
pub trait Connector: Send + Sync {
    /// The backend kind this connector builds specifiers for
    fn kind(&self) -> BackendKind;

    /// Build a specifier, filling tunables the data omits from `defaults`
    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>>;
}

/// Turns stored endpoint records into specifiers
pub trait SpecifierResolver: Send + Sync {
    fn resolve(&self, record: &EndpointRecord) -> Result<Arc<dyn Specifier>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Params {
        host: String,
    }

    #[test]
    fn test_record_uses_type_field() {
        let record: EndpointRecord = serde_json::from_value(json!({
            "id": 7,
            "api_id": 3,
            "type": "redis",
            "data": {"config": {"host": "cache"}}
        }))
        .unwrap();
        assert_eq!(record, EndpointRecord::new(7, "redis", json!({"config": {"host": "cache"}})).with_api_id(3));
    }

    #[test]
    fn test_endpoint_data_tunables() {
        let data = EndpointData::<Params>::from_value(
            BackendKind::Postgres,
            &json!({"config": {"host": "db1"}, "maxOpenConn": 5}),
        )
        .unwrap();
        assert_eq!(data.config.host, "db1");
        assert_eq!(data.max_open_conn, Some(5));
        assert_eq!(data.max_idle_conn, None);

        let defaults = PoolsConfig::default().with_sql_limits(PoolLimits::new(20, 4));
        assert_eq!(data.sql_limits(&defaults), PoolLimits::new(5, 4));
        assert_eq!(data.redis_limits(&defaults), PoolsConfig::default().redis);
        assert_eq!(data.mongo_limit(&defaults), defaults.mongo_limit());
    }

    #[test]
    fn test_endpoint_data_missing_config() {
        let err = EndpointData::<Params>::from_value(BackendKind::Postgres, &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("postgres endpoint data"));
    }
}
