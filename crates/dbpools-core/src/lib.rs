//! dbpools Core - Core abstractions for pooled backend handles
//!
//! This crate provides the traits and types every other dbpools crate
//! depends on. It defines:
//!
//! - `Specifier` - Desired configuration of a connection to one backend server
//! - `Database` - A live, shareable handle opened from a `Specifier`
//! - `Connector` / `SpecifierResolver` - Turning stored endpoint records into specifiers
//! - `ManagedDb` - A deadpool-backed handle shared by the SQL-like and key-value backends
//! - Common types like `BackendKind`, `PoolLimits`, `PoolsConfig`

mod canonical;
mod config;
mod error;
mod kind;
mod managed;
mod resolver;
mod specifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use canonical::*;
pub use config::*;
pub use error::*;
pub use kind::*;
pub use managed::*;
pub use resolver::*;
pub use specifier::*;

// Re-export async_trait for driver implementations
pub use async_trait::async_trait;
