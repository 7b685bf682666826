//! MS SQL Server handles for dbpools
//!
//! A handle is a deadpool pool of tiberius clients over tokio TCP streams.
//! `connection timeout`, `encrypt` and `schema` are tunables. The schema is
//! not a connection setting; callers qualify names with it.

mod connector;
mod spec;
#[cfg(test)]
mod spec_tests;

pub use connector::SqlServerConnector;
pub use spec::*;
