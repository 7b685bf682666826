//! Redis handles for dbpools
//!
//! A Redis handle is a deadpool pool of multiplexed connections. Pool size
//! follows the endpoint's max-active setting; idle connections beyond
//! max-idle are dropped when the handle is retuned.

mod connector;
mod spec;
#[cfg(test)]
mod spec_tests;

pub use connector::RedisConnector;
pub use spec::*;
