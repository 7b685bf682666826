//! SQL Server endpoint connector

use std::sync::Arc;

use dbpools_core::{BackendKind, Connector, EndpointData, PoolsConfig, Result, Specifier};

use crate::{SqlServerParams, SqlServerSpec};

/// Builds SQL Server specifiers from endpoint data
///
/// Tunables are read from `maxOpenConn` and `maxIdleConn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerConnector;

impl SqlServerConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for SqlServerConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::SqlServer
    }

    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>> {
        let data = EndpointData::<SqlServerParams>::from_value(self.kind(), data)?;
        let limits = data.sql_limits(defaults);
        Ok(SqlServerSpec::new(data.config, limits)?.into_arc())
    }
}
