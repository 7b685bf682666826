//! MongoDB endpoint connector

use std::sync::Arc;

use dbpools_core::{BackendKind, Connector, EndpointData, PoolsConfig, Result, Specifier};

use crate::{MongoParams, MongoSpec};

/// Builds MongoDB specifiers from endpoint data
///
/// The session limit is read from `limit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

impl MongoConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MongoConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    fn specifier(
        &self,
        data: &serde_json::Value,
        defaults: &PoolsConfig,
    ) -> Result<Arc<dyn Specifier>> {
        let data = EndpointData::<MongoParams>::from_value(self.kind(), data)?;
        let limit = data.mongo_limit(defaults);
        Ok(MongoSpec::new(data.config, limit)?.into_arc())
    }
}
