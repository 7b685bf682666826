//! MySQL endpoint connector

use std::sync::Arc;

use dbpools_core::{BackendKind, Connector, EndpointData, PoolsConfig, Result, Specifier};

use crate::{MySqlParams, MySqlSpec};

/// Builds MySQL specifiers from endpoint data
///
/// Tunables are read from `maxOpenConn` and `maxIdleConn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MySqlConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>> {
        let data = EndpointData::<MySqlParams>::from_value(self.kind(), data)?;
        let limits = data.sql_limits(defaults);
        Ok(MySqlSpec::new(data.config, limits)?.into_arc())
    }
}
