//! MongoDB handles for dbpools
//!
//! A MongoDB handle wraps one `mongodb::Client`. The client keeps its own
//! connection pool, so the tunable here is the number of concurrent
//! sessions a handle hands out. Shrinking the limit never interrupts
//! sessions already checked out.

mod connector;
mod handle;
mod spec;
#[cfg(test)]
mod spec_tests;

pub use connector::MongoConnector;
pub use handle::{MongoDb, MongoSession};
pub use spec::*;
