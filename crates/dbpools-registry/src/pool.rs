//! Server pools and the connect algorithm
//!
//! A [`ServerPool`] maps canonical server identities of one backend kind to
//! live handles. [`Pools`] holds one server pool per kind and routes
//! specifiers to them.
//!
//! # Example
//!
//! ```ignore
//! use dbpools_registry::Pools;
//!
//! let pools = Pools::from_config(&config);
//! let db = pools.connect(spec).await?;
//! // Same identity, new tunables: the handle is retuned in place
//! let same = pools.connect(retuned_spec).await?;
//! ```

mod connect;
mod pools;
mod server_pool;


pub use connect::{connect, flush_entry};
pub use pools::Pools;
pub use server_pool::{ReadSlots, ServerPool, SpecSnapshot, WriteSlots};
