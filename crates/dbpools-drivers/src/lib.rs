//! dbpools drivers - backend connectors
//!
//! Re-exports the per-backend crates enabled by features and provides the
//! [`ConnectorRegistry`], which turns stored endpoint records into
//! specifiers.

// SQL backends
#[cfg(feature = "mssql")]
pub use dbpools_driver_mssql as mssql;
#[cfg(feature = "mysql")]
pub use dbpools_driver_mysql as mysql;
#[cfg(feature = "postgres")]
pub use dbpools_driver_postgres as postgres;

// NoSQL backends
#[cfg(feature = "mongodb")]
pub use dbpools_driver_mongodb as mongodb;
#[cfg(feature = "redis")]
pub use dbpools_driver_redis as redis;

mod registry;

pub use registry::ConnectorRegistry;

/// Re-export commonly used types from dbpools-core
pub use dbpools_core::{
    BackendKind, Connector, DbPoolError, EndpointRecord, PoolLimits, PoolsConfig, Result,
    Specifier, SpecifierResolver,
};
