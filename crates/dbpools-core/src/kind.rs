//! Backend kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DbPoolError;

/// The family of backend a specifier targets.
///
/// Each kind owns exactly one server pool, so equal identity strings of
/// different kinds never share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "sqlserver")]
    SqlServer,
    #[serde(rename = "mongodb")]
    MongoDb,
    Redis,
}

impl BackendKind {
    /// Every kind shipped with dbpools, in registration order
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Postgres,
        BackendKind::MySql,
        BackendKind::SqlServer,
        BackendKind::MongoDb,
        BackendKind::Redis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
            BackendKind::SqlServer => "sqlserver",
            BackendKind::MongoDb => "mongodb",
            BackendKind::Redis => "redis",
        }
    }

    /// Whether the kind speaks SQL and takes the shared SQL tunables
    pub fn is_sql(&self) -> bool {
        matches!(
            self,
            BackendKind::Postgres | BackendKind::MySql | BackendKind::SqlServer
        )
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DbPoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "mysql" => Ok(BackendKind::MySql),
            "sqlserver" | "mssql" => Ok(BackendKind::SqlServer),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDb),
            "redis" => Ok(BackendKind::Redis),
            other => Err(DbPoolError::Configuration(format!(
                "unknown backend kind: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("mssql".parse::<BackendKind>().unwrap(), BackendKind::SqlServer);
        assert_eq!("mongo".parse::<BackendKind>().unwrap(), BackendKind::MongoDb);
        assert!("oracle".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        for kind in BackendKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
            let back: BackendKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }
}
