//! Unit tests for the SQL Server specifier and connector

use std::time::Duration;

use dbpools_core::{BackendKind, Connector, PoolLimits, PoolsConfig, Specifier, fingerprint};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use crate::{Encrypt, SqlServerConnector, SqlServerParams, SqlServerSpec};

fn simple() -> SqlServerParams {
    SqlServerParams::new("some.url.net", 1234, "user", "pass", "db").with_schema("dbschema")
}

fn complicated() -> SqlServerParams {
    SqlServerParams::new("some.url.net", 1234, "user", "pass", "db")
        .with_schema("complexSchema")
        .with_timeout(30)
        .with_encrypt("true")
}

fn spec(params: SqlServerParams) -> SqlServerSpec {
    SqlServerSpec::new(params, PoolLimits::new(5, 2)).unwrap()
}

#[rstest]
#[case::simple(
    simple(),
    "database=db;password=pass;port=1234;schema=dbschema;server=some.url.net;user id=user"
)]
#[case::complicated(
    complicated(),
    "database=db;encrypt=true;password=pass;port=1234;schema=complexSchema;server=some.url.net;timeout=30;user id=user"
)]
fn test_connection_string(#[case] params: SqlServerParams, #[case] expected: &str) {
    let spec = spec(params);
    assert_eq!(spec.connection_string(), expected);
    assert_eq!(
        spec.unique_server(),
        format!(
            "database=db;host=some.url.net;password={};port=1234;user id=user",
            fingerprint("pass")
        )
    );
}

#[test]
fn test_tunables() {
    let simple = spec(simple());
    let complicated = spec(complicated());
    assert_eq!(simple.unique_server(), complicated.unique_server());
    assert!(simple.needs_update(&complicated));
    assert!(!simple.needs_update(&spec(self::simple())));

    assert_eq!(complicated.encrypt(), Some(Encrypt::On));
    assert_eq!(complicated.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(complicated.schema(), Some("complexSchema"));
    assert_eq!(simple.encrypt(), None);
    assert_eq!(simple.timeout(), None);
}

#[test]
fn test_schema_only_qualifies_names() {
    let scoped = spec(simple());
    let unscoped = spec(simple().with_schema(""));
    assert_eq!(
        format!("{:?}", scoped.config()),
        format!("{:?}", unscoped.config())
    );
    assert_eq!(scoped.unique_server(), unscoped.unique_server());
    assert!(scoped.needs_update(&unscoped));

    assert_eq!(scoped.qualify("orders"), "[dbschema].[orders]");
    assert_eq!(unscoped.qualify("orders"), "[orders]");
    assert_eq!(
        spec(simple().with_schema("odd]name")).qualify("t"),
        "[odd]]name].[t]"
    );
}

#[rstest]
#[case::no_user(SqlServerParams::new("db1", 1433, "", "pw", "db"), r#"bad value "" for "user id""#)]
#[case::no_password(SqlServerParams::new("db1", 1433, "app", "", "db"), r#"bad value "" for "password""#)]
#[case::no_database(SqlServerParams::new("db1", 1433, "app", "pw", ""), r#"bad value "" for "database""#)]
#[case::no_server(SqlServerParams::new("", 1433, "app", "pw", "db"), r#"bad value "" for "server""#)]
#[case::bad_encrypt(simple().with_encrypt("maybe"), r#"bad value "maybe" for "encrypt""#)]
fn test_validation(#[case] params: SqlServerParams, #[case] expected: &str) {
    let message = SqlServerSpec::new(params, PoolLimits::default())
        .unwrap_err()
        .to_string();
    assert!(message.contains("sqlserver config errors"), "{message}");
    assert!(message.contains(expected), "{message}");
}

#[test]
fn test_debug_redacts_password() {
    assert!(!format!("{:?}", simple()).contains("\"pass\""));
}

#[test]
fn test_connector_reads_spaced_keys() {
    let connector = SqlServerConnector::new();
    assert_eq!(connector.kind(), BackendKind::SqlServer);

    let spec = connector
        .specifier(
            &json!({
                "config": {
                    "server": "db1",
                    "user id": "app",
                    "password": "pw",
                    "database": "orders",
                    "connection timeout": 15,
                    "encrypt": "disable"
                },
                "maxOpenConn": 7
            }),
            &PoolsConfig::default(),
        )
        .unwrap();
    let mssql = spec.as_any().downcast_ref::<SqlServerSpec>().unwrap();
    assert_eq!(mssql.limits(), PoolLimits::new(7, 2));
    assert_eq!(mssql.params().port, 1433);
    assert_eq!(mssql.encrypt(), Some(Encrypt::Disable));
    assert_eq!(mssql.timeout(), Some(Duration::from_secs(15)));
}

#[test]
fn test_connector_rejects_negative_timeout() {
    let err = SqlServerConnector::new()
        .specifier(
            &json!({"config": {"server": "db1", "connection timeout": -1}}),
            &PoolsConfig::default(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("sqlserver endpoint data"), "{err}");
}
