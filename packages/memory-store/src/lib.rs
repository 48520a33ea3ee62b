//! In-memory store adapter for flatstore.
//!
//! [`MemoryStore`] implements the [`Datastore`](flatstore_core::Datastore)
//! boundary on top of a shared map. It is a reference adapter and a test
//! double: transactions use optimistic version checks, batches apply their
//! mutations one at a time, and [`MemoryStore::fail_on_write`] injects a
//! failure at a chosen entity write.
//!
//! ```rust
//! use flatstore_core::{Datastore, Entity, Key, Kind, Namespace};
//! use flatstore_memory::MemoryStore;
//!
//! let mut store = MemoryStore::new();
//! let key = Key::new(Kind::new("User"), Namespace::default(), "alice");
//! store.put(vec![Entity::new(key.clone())]).unwrap();
//!
//! assert!(store.contains(&key));
//! assert_eq!(store.len(), 1);
//! ```

mod store;
mod transaction;

pub use store::MemoryStore;
pub use transaction::{MemoryBatch, MemoryTransaction};
