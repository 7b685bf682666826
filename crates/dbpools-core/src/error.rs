//! Error types for dbpools

use thiserror::Error;

use crate::BackendKind;

/// Core error type for pooling operations
#[derive(Error, Debug)]
pub enum DbPoolError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("could not connect to {kind} backend {server}: {message}")]
    Connect {
        kind: BackendKind,
        server: String,
        message: String,
    },

    #[error("could not update {kind} backend {server}: {message}")]
    Update {
        kind: BackendKind,
        server: String,
        message: String,
    },

    #[error("no pool defined for backend kind {0}")]
    NoPool(BackendKind),

    #[error("tried to compare wrong database kinds: {expected} and {found}")]
    KindMismatch {
        expected: BackendKind,
        found: BackendKind,
    },

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Closed: {0}")]
    Closed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DbPoolError {
    /// Wrap a creation failure so it names the backend it was for.
    ///
    /// `server` must be a canonical identity; it never carries secrets.
    pub fn into_connect(self, kind: BackendKind, server: &str) -> Self {
        match self {
            err @ DbPoolError::Connect { .. } => err,
            other => DbPoolError::Connect {
                kind,
                server: server.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Wrap a reconfiguration failure so it names the backend it was for.
    pub fn into_update(self, kind: BackendKind, server: &str) -> Self {
        match self {
            err @ DbPoolError::Update { .. } => err,
            other => DbPoolError::Update {
                kind,
                server: server.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for pooling operations
pub type Result<T> = std::result::Result<T, DbPoolError>;

/// Collects every validation failure of a connector's parameters so they
/// can be reported at once
#[derive(Debug)]
pub struct ConfigErrors {
    backend: &'static str,
    messages: Vec<String>,
}

impl ConfigErrors {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Record a failure if a required value is blank
    pub fn require(&mut self, key: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(format!("bad value {value:?} for {key:?}"));
        }
    }

    /// Record a failure if a required port is zero
    pub fn require_port(&mut self, key: &str, port: u16) {
        if port == 0 {
            self.push(format!("bad value \"0\" for {key:?}"));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Ok` if nothing was recorded, otherwise one configuration error
    /// listing every failure
    pub fn finish(self) -> Result<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(DbPoolError::Configuration(format!(
                "{} config errors: {}",
                self.backend,
                self.messages.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_names_backend() {
        let err = DbPoolError::Driver("connection refused".into())
            .into_connect(BackendKind::Postgres, "dbname=orders host=db1 port=5432");
        assert_eq!(
            err.to_string(),
            "could not connect to postgres backend dbname=orders host=db1 port=5432: \
             Driver error: connection refused"
        );
    }

    #[test]
    fn test_connect_error_is_not_wrapped_twice() {
        let err = DbPoolError::Driver("boom".into())
            .into_connect(BackendKind::Redis, "redis://a:1/0")
            .into_connect(BackendKind::Redis, "redis://a:1/0");
        match err {
            DbPoolError::Connect { message, .. } => assert_eq!(message, "Driver error: boom"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_config_errors_are_collected() {
        let mut errors = ConfigErrors::new("postgres");
        errors.require("host", "");
        errors.require("dbname", "orders");
        errors.require_port("port", 0);
        assert_eq!(
            errors.finish().unwrap_err().to_string(),
            r#"Configuration error: postgres config errors: bad value "" for "host"; bad value "0" for "port""#
        );
        assert!(ConfigErrors::new("redis").finish().is_ok());
    }

    #[test]
    fn test_kind_mismatch_message() {
        let err = DbPoolError::KindMismatch {
            expected: BackendKind::Redis,
            found: BackendKind::MongoDb,
        };
        assert_eq!(
            err.to_string(),
            "tried to compare wrong database kinds: redis and mongodb"
        );
    }
}
