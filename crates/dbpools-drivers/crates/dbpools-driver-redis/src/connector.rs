//! Redis endpoint connector

use std::sync::Arc;

use dbpools_core::{BackendKind, Connector, EndpointData, PoolsConfig, Result, Specifier};

use crate::{RedisParams, RedisSpec};

/// Builds Redis specifiers from endpoint data
///
/// Tunables are read from `maxActive` and `maxIdle`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

impl RedisConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for RedisConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>> {
        let data = EndpointData::<RedisParams>::from_value(self.kind(), data)?;
        let limits = data.redis_limits(defaults);
        Ok(RedisSpec::new(data.config, limits)?.into_arc())
    }
}
