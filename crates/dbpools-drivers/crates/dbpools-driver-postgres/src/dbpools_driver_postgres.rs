//! PostgreSQL handles for dbpools
//!
//! Parameters are a libpq keyword map. The canonical identity is the sorted
//! keyword string without `connect_timeout` and with the password replaced
//! by its fingerprint.

mod connector;
mod spec;
#[cfg(test)]
mod spec_tests;

pub use connector::PostgresConnector;
pub use spec::*;
