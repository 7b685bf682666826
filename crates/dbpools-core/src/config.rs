//! Pool configuration types

use serde::{Deserialize, Serialize};

use crate::{BackendKind, Result};

/// Default number of concurrent MongoDB sessions
pub const DEFAULT_MONGO_POOL_LIMIT: usize = 16;

/// Size limits applied to a pooled handle
///
/// A `max_open` of 0 means "no explicit limit": the handle falls back to
/// deadpool's default pool size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Maximum number of open connections
    #[serde(default)]
    max_open: usize,
    /// Maximum number of idle connections kept around
    #[serde(default = "default_max_idle")]
    max_idle: usize,
}

fn default_max_idle() -> usize {
    2
}

impl PoolLimits {
    pub fn new(max_open: usize, max_idle: usize) -> Self {
        Self { max_open, max_idle }
    }

    /// Get the configured maximum of open connections (0 = default)
    pub fn max_open(&self) -> usize {
        self.max_open
    }

    /// Get the maximum of idle connections
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Effective pool size handed to deadpool
    pub fn pool_size(&self) -> usize {
        if self.max_open == 0 {
            deadpool::managed::PoolConfig::default().max_size
        } else {
            self.max_open
        }
    }

    /// Idle connections to keep, never more than the pool size
    pub fn idle_size(&self) -> usize {
        self.max_idle.min(self.pool_size())
    }
}

impl Default for PoolLimits {
    /// Defaults: unlimited open (deadpool default size), 2 idle
    fn default() -> Self {
        Self::new(0, default_max_idle())
    }
}

/// Configuration for the pools registry and the connector defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolsConfig {
    /// Backend kinds that get a server pool
    pub kinds: Vec<BackendKind>,
    /// Default tunables for Postgres, MySQL and SQL Server
    pub sql: PoolLimits,
    /// Default tunables for Redis (max active / max idle)
    pub redis: PoolLimits,
    /// Default MongoDB session limit; 0 means the built-in default
    pub mongo_pool_limit: usize,
}

impl PoolsConfig {
    /// Parse a configuration from TOML
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Only register the given kinds
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Set the default SQL tunables
    pub fn with_sql_limits(mut self, limits: PoolLimits) -> Self {
        self.sql = limits;
        self
    }

    /// Set the default Redis tunables
    pub fn with_redis_limits(mut self, limits: PoolLimits) -> Self {
        self.redis = limits;
        self
    }

    /// Set the default MongoDB session limit
    pub fn with_mongo_pool_limit(mut self, limit: usize) -> Self {
        self.mongo_pool_limit = limit;
        self
    }

    /// Effective MongoDB session limit
    pub fn mongo_limit(&self) -> usize {
        if self.mongo_pool_limit == 0 {
            DEFAULT_MONGO_POOL_LIMIT
        } else {
            self.mongo_pool_limit
        }
    }
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            kinds: BackendKind::ALL.to_vec(),
            sql: PoolLimits::default(),
            redis: PoolLimits::default(),
            mongo_pool_limit: DEFAULT_MONGO_POOL_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolsConfig::default();
        assert_eq!(config.kinds, BackendKind::ALL.to_vec());
        assert_eq!(config.sql, PoolLimits::new(0, 2));
        assert_eq!(config.mongo_limit(), DEFAULT_MONGO_POOL_LIMIT);
    }

    #[test]
    fn test_zero_open_uses_deadpool_default() {
        let limits = PoolLimits::new(0, 2);
        assert_eq!(
            limits.pool_size(),
            deadpool::managed::PoolConfig::default().max_size
        );
        assert_eq!(PoolLimits::new(5, 2).pool_size(), 5);
        assert_eq!(PoolLimits::new(1, 4).idle_size(), 1);
    }

    #[test]
    fn test_from_toml() {
        let config = PoolsConfig::from_toml_str(
            r#"
            kinds = ["postgres", "redis"]
            mongo_pool_limit = 0

            [sql]
            max_open = 20
            max_idle = 5

            [redis]
            max_open = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.kinds, vec![BackendKind::Postgres, BackendKind::Redis]);
        assert_eq!(config.sql, PoolLimits::new(20, 5));
        assert_eq!(config.redis, PoolLimits::new(8, 2));
        assert_eq!(config.mongo_limit(), DEFAULT_MONGO_POOL_LIMIT);
    }

    #[test]
    fn test_from_toml_rejects_unknown_kind() {
        let err = PoolsConfig::from_toml_str(r#"kinds = ["oracle"]"#).unwrap_err();
        assert!(err.to_string().starts_with("TOML error"));
    }
}
