//! Connector registry

use std::collections::HashMap;
use std::sync::Arc;

use dbpools_core::{
    BackendKind, Connector, DbPoolError, EndpointRecord, PoolsConfig, Result, Specifier,
    SpecifierResolver,
};

/// Registry of connectors, keyed by backend kind
///
/// Tunables an endpoint record leaves out are filled from the registry's
/// [`PoolsConfig`].
pub struct ConnectorRegistry {
    connectors: HashMap<BackendKind, Arc<dyn Connector>>,
    defaults: PoolsConfig,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
            defaults: PoolsConfig::default(),
        }
    }

    /// Create a registry with every built-in connector registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresConnector::new()));
        #[cfg(feature = "mysql")]
        registry.register(Arc::new(crate::mysql::MySqlConnector::new()));
        #[cfg(feature = "mssql")]
        registry.register(Arc::new(crate::mssql::SqlServerConnector::new()));
        #[cfg(feature = "mongodb")]
        registry.register(Arc::new(crate::mongodb::MongoConnector::new()));
        #[cfg(feature = "redis")]
        registry.register(Arc::new(crate::redis::RedisConnector::new()));

        registry
    }

    /// Use `config` for tunables records leave out
    pub fn with_config(mut self, config: PoolsConfig) -> Self {
        self.defaults = config;
        self
    }

    pub fn config(&self) -> &PoolsConfig {
        &self.defaults
    }

    /// Register a connector, replacing any previous one for its kind
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        let kind = connector.kind();
        tracing::info!(kind = %kind, "registering connector");
        self.connectors.insert(kind, connector);
    }

    /// Get the connector for a kind
    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn Connector>> {
        let connector = self.connectors.get(&kind).cloned();
        if connector.is_none() {
            tracing::warn!(kind = %kind, "connector not found in registry");
        }
        connector
    }

    /// Check if a connector is registered
    pub fn has(&self, kind: BackendKind) -> bool {
        self.connectors.contains_key(&kind)
    }

    /// Registered kinds, in [`BackendKind::ALL`] order
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| self.has(*kind))
            .collect()
    }

    /// Build a specifier for `kind` from raw endpoint data
    pub fn specifier(
        &self,
        kind: BackendKind,
        data: &serde_json::Value,
    ) -> Result<Arc<dyn Specifier>> {
        let connector = self.get(kind).ok_or_else(|| {
            DbPoolError::Resolution(format!("no connector registered for {kind}"))
        })?;
        connector.specifier(data, &self.defaults)
    }
}

impl SpecifierResolver for ConnectorRegistry {
    fn resolve(&self, record: &EndpointRecord) -> Result<Arc<dyn Specifier>> {
        let kind: BackendKind = record.kind.parse().map_err(|_| {
            DbPoolError::Resolution(format!(
                "endpoint {} has unsupported type {:?}",
                record.id, record.kind
            ))
        })?;
        self.specifier(kind, &record.data)
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
