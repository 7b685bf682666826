//! MySQL handles for dbpools
//!
//! A MySQL handle is a deadpool pool of `mysql_async` connections. The
//! optional `timeout` bounds each connection attempt and is a tunable: it
//! can change without changing the server identity.

mod connector;
mod spec;
#[cfg(test)]
mod spec_tests;

pub use connector::MySqlConnector;
pub use spec::*;
