//! PostgreSQL endpoint connector

use std::sync::Arc;

use dbpools_core::{BackendKind, Connector, EndpointData, PoolsConfig, Result, Specifier};

use crate::{PostgresParams, PostgresSpec};

/// Builds PostgreSQL specifiers from endpoint data
///
/// Tunables are read from `maxOpenConn` and `maxIdleConn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for PostgresConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>> {
        let data = EndpointData::<PostgresParams>::from_value(self.kind(), data)?;
        let limits = data.sql_limits(defaults);
        Ok(PostgresSpec::new(data.config, limits)?.into_arc())
    }
}
