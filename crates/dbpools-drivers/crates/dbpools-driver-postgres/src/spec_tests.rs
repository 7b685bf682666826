//! Unit tests for the PostgreSQL specifier and connector

use dbpools_core::{BackendKind, Connector, DbPoolError, PoolLimits, PoolsConfig, Specifier, fingerprint};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use crate::{PostgresConnector, PostgresParams, PostgresSpec, SslMode};

fn orders() -> PostgresParams {
    [
        ("host", "db1"),
        ("port", "5432"),
        ("dbname", "orders"),
        ("user", "app"),
    ]
    .into_iter()
    .collect()
}

fn spec(params: PostgresParams, max_open: usize) -> PostgresSpec {
    PostgresSpec::new(params, PoolLimits::new(max_open, 2)).unwrap()
}

#[test]
fn test_identity_is_sorted_and_excludes_timeout() {
    let spec = spec(orders().with("connect_timeout", 10), 5);
    assert_eq!(spec.unique_server(), "dbname=orders host=db1 port=5432 user=app");
    assert_eq!(
        spec.connection_string(),
        "connect_timeout=10 dbname=orders host=db1 port=5432 user=app"
    );
}

#[test]
fn test_identity_fingerprints_password() {
    let spec = spec(orders().with("password", "hunter2"), 5);
    assert_eq!(
        spec.unique_server(),
        format!(
            "dbname=orders host=db1 password={} port=5432 user=app",
            fingerprint("hunter2")
        )
    );
    assert!(spec.connection_string().contains("password=hunter2"));
}

#[test]
fn test_values_are_quoted_and_escaped() {
    let spec = spec(
        orders()
            .with("dbname", "order history")
            .with("password", "it's"),
        5,
    );
    assert_eq!(
        spec.connection_string(),
        r"dbname='order history' host=db1 password=it\'s port=5432 user=app"
    );
}

#[test]
fn test_backslashes_survive_the_keyword_string() {
    let spec = spec(orders().with("password", r"a\b").with("user", "app\tadmin"), 5);
    let parsed: tokio_postgres::Config = spec.connection_string().parse().unwrap();
    assert_eq!(parsed.get_password(), Some(r"a\b".as_bytes()));
    assert_eq!(parsed.get_user(), Some("app\tadmin"));

    let config = spec.config().unwrap();
    assert_eq!(config.get_password(), Some(r"a\b".as_bytes()));
}

#[test]
fn test_config_is_built_from_the_map() {
    let spec = spec(orders().with("password", "pw").with("connect_timeout", 7), 5);
    let config = spec.config().unwrap();
    assert_eq!(config.get_dbname(), Some("orders"));
    assert_eq!(config.get_user(), Some("app"));
    assert_eq!(config.get_ports(), &[5432]);
    assert_eq!(
        config.get_connect_timeout(),
        Some(&std::time::Duration::from_secs(7))
    );
    assert_eq!(config.get_ssl_mode(), tokio_postgres::config::SslMode::Prefer);

    let unbounded = spec_with_timeout(0).config().unwrap();
    assert_eq!(unbounded.get_connect_timeout(), None);
}

fn spec_with_timeout(secs: u64) -> PostgresSpec {
    spec(orders().with("connect_timeout", secs), 5)
}

#[rstest]
#[case::disable("disable", SslMode::Disable, tokio_postgres::config::SslMode::Disable)]
#[case::allow("allow", SslMode::Allow, tokio_postgres::config::SslMode::Prefer)]
#[case::prefer("prefer", SslMode::Prefer, tokio_postgres::config::SslMode::Prefer)]
#[case::require("require", SslMode::Require, tokio_postgres::config::SslMode::Require)]
#[case::verify_ca("verify-ca", SslMode::VerifyCa, tokio_postgres::config::SslMode::Require)]
#[case::verify_full("verify-full", SslMode::VerifyFull, tokio_postgres::config::SslMode::Require)]
fn test_ssl_modes(
    #[case] value: &str,
    #[case] mode: SslMode,
    #[case] driver: tokio_postgres::config::SslMode,
) {
    let spec = spec(orders().with("sslmode", value), 5);
    assert_eq!(spec.ssl_mode(), mode);
    assert_eq!(mode.as_str(), value);
    assert_eq!(spec.config().unwrap().get_ssl_mode(), driver);
    assert_eq!(
        mode.tls_connector().unwrap().is_some(),
        mode != SslMode::Disable
    );
}

#[test]
fn test_ssl_mode_defaults_to_prefer() {
    assert_eq!(spec(orders(), 5).ssl_mode(), SslMode::Prefer);
    assert_eq!(spec(orders().with("sslmode", ""), 5).ssl_mode(), SslMode::Prefer);
}

#[test]
fn test_retuning_keeps_identity() {
    let five = spec(orders(), 5);
    let ten = spec(orders(), 10);
    assert_eq!(five.unique_server(), ten.unique_server());
    assert!(five.needs_update(&ten));
    assert!(!five.needs_update(&spec(orders(), 5)));

    let slow = spec(orders().with("connect_timeout", 30), 5);
    assert_eq!(five.unique_server(), slow.unique_server());
    assert!(five.needs_update(&slow));
}

#[rstest]
#[case::missing_host("host", r#"bad value "" for "host""#)]
#[case::missing_port("port", r#"bad value "" for "port""#)]
#[case::missing_dbname("dbname", r#"bad value "" for "dbname""#)]
#[case::missing_user("user", r#"bad value "" for "user""#)]
fn test_required_keywords(#[case] blank: &str, #[case] expected: &str) {
    let err = PostgresSpec::new(orders().with(blank, ""), PoolLimits::default()).unwrap_err();
    assert!(matches!(err, DbPoolError::Configuration(_)));
    let message = err.to_string();
    assert!(message.contains("postgres config errors"), "{message}");
    assert!(message.contains(expected), "{message}");
}

#[rstest]
#[case::unknown_key(orders().with("application", "x"), r#"unexpected key "application""#)]
#[case::bad_port(orders().with("port", "fifty"), r#"bad value "fifty" for "port""#)]
#[case::bad_timeout(orders().with("connect_timeout", "soon"), r#"bad value "soon" for "connect_timeout""#)]
#[case::bad_sslmode(orders().with("sslmode", "verify"), r#"bad value "verify" for "sslmode""#)]
#[case::uppercase_sslmode(orders().with("sslmode", "REQUIRE"), r#"bad value "REQUIRE" for "sslmode""#)]
fn test_invalid_maps(#[case] params: PostgresParams, #[case] expected: &str) {
    let message = PostgresSpec::new(params, PoolLimits::default())
        .unwrap_err()
        .to_string();
    assert!(message.contains(expected), "{message}");
}

#[test]
fn test_debug_redacts_password() {
    let params = orders().with("password", "hunter2");
    let debug = format!("{params:?}");
    assert!(!debug.contains("hunter2"), "{debug}");
    assert!(debug.contains("db1"), "{debug}");
}

#[test]
fn test_connector_accepts_numeric_values() {
    let connector = PostgresConnector::new();
    assert_eq!(connector.kind(), BackendKind::Postgres);

    let defaults = PoolsConfig::default().with_sql_limits(PoolLimits::new(4, 1));
    let spec = connector
        .specifier(
            &json!({
                "config": {
                    "host": "db1",
                    "port": 5432,
                    "dbname": "orders",
                    "user": "app",
                    "password": "pw"
                },
                "maxIdleConn": 3
            }),
            &defaults,
        )
        .unwrap();

    let pg = spec.as_any().downcast_ref::<PostgresSpec>().unwrap();
    assert_eq!(pg.limits(), PoolLimits::new(4, 3));
    assert_eq!(pg.params().get("port"), Some("5432"));
}

#[test]
fn test_connector_rejects_nested_values() {
    let err = PostgresConnector::new()
        .specifier(
            &json!({"config": {"host": ["db1", "db2"]}}),
            &PoolsConfig::default(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("postgres endpoint data"), "{err}");
}
