//! Endpoint records resolved through the built-in connectors

use std::sync::Arc;

use dbpools_core::testing::{MockCounters, MockSpec};
use dbpools_drivers::{
    BackendKind, ConnectorRegistry, EndpointRecord, PoolLimits, PoolsConfig, SpecifierResolver,
};
use dbpools_registry::{Notification, Payload, PoolListener, Pools};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn orders_record(max_open: usize) -> EndpointRecord {
    EndpointRecord::new(
        1,
        "postgres",
        json!({
            "config": {"host": "db1", "port": 5432, "dbname": "orders", "user": "app"},
            "maxOpenConn": max_open
        }),
    )
}

#[test]
fn retuned_record_keeps_its_identity() {
    let registry = ConnectorRegistry::with_defaults();
    let five = registry.resolve(&orders_record(5)).unwrap();
    let ten = registry.resolve(&orders_record(10)).unwrap();

    assert_eq!(five.unique_server(), "dbname=orders host=db1 port=5432 user=app");
    assert_eq!(five.unique_server(), ten.unique_server());
    assert!(five.needs_update(ten.as_ref()));
    assert!(!five.needs_update(five.as_ref()));
}

#[rstest]
#[case::postgres("postgres", BackendKind::Postgres, json!({"host": "db1", "port": 5432, "dbname": "d", "user": "u"}))]
#[case::postgresql_alias("postgresql", BackendKind::Postgres, json!({"host": "db1", "port": 5432, "dbname": "d", "user": "u"}))]
#[case::mysql("mysql", BackendKind::MySql, json!({"server": "db1", "port": 3306, "username": "u", "password": "p", "dbname": "d"}))]
#[case::sqlserver("sqlserver", BackendKind::SqlServer, json!({"server": "db1", "user id": "u", "password": "p", "database": "d"}))]
#[case::mongodb("mongodb", BackendKind::MongoDb, json!({"hosts": [{"host": "m1", "port": 27017}], "username": "u", "password": "p", "database": "d"}))]
#[case::redis("redis", BackendKind::Redis, json!({"host": "cache", "port": 6379}))]
fn every_builtin_kind_resolves(
    #[case] kind_name: &str,
    #[case] kind: BackendKind,
    #[case] config: serde_json::Value,
) {
    let registry = ConnectorRegistry::with_defaults();
    let record = EndpointRecord::new(1, kind_name, json!({ "config": config }));
    let spec = registry.resolve(&record).unwrap();
    assert_eq!(spec.kind(), kind);
    assert!(!spec.unique_server().is_empty());
}

#[test]
fn defaults_fill_missing_tunables() {
    let registry = ConnectorRegistry::with_defaults()
        .with_config(PoolsConfig::default().with_sql_limits(PoolLimits::new(25, 5)));
    let record = EndpointRecord::new(
        1,
        "mysql",
        json!({"config": {"server": "db1", "port": 3306, "username": "u", "password": "p", "dbname": "d"}}),
    );
    let spec = registry.resolve(&record).unwrap();
    let mysql = spec
        .as_any()
        .downcast_ref::<dbpools_drivers::mysql::MySqlSpec>()
        .unwrap();
    assert_eq!(mysql.limits(), PoolLimits::new(25, 5));
}

#[tokio::test]
async fn listener_evicts_by_record() {
    let counters = MockCounters::new();
    let pools = Arc::new(Pools::new());

    // A stand-in handle pooled under the identity the record resolves to
    let pooled = MockSpec::new(BackendKind::Postgres, "dbname=orders host=db1 port=5432 user=app")
        .with_counters(counters.clone())
        .into_arc();
    pools.connect(pooled).await.unwrap();

    let listener = PoolListener::new(pools.clone())
        .with_resolver(Arc::new(ConnectorRegistry::with_defaults()));

    let evicted = listener
        .notify(Notification::changed(Payload::Record(orders_record(10))))
        .await;
    assert!(evicted);
    assert_eq!(counters.close_calls(), 1);

    let pool = pools.pool_for(BackendKind::Postgres).unwrap();
    assert!(pool.is_empty().await);

    let unsupported = EndpointRecord::new(2, "oracle", json!({}));
    assert!(
        !listener
            .notify(Notification::deleted(Payload::Record(unsupported)))
            .await
    );
}
