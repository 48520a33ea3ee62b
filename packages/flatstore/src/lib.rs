//! flatstore: typed records over the flat property model of a key-value store.
//!
//! A record type is flattened into `(property path, value)` pairs on the way
//! in and rebuilt from them on the way out, so stores that only know flat,
//! schemaless entities can hold nested structs, lists, maps and enums.
//!
//! # Layers
//!
//! - `flatstore-core`: paths, values, records, keys, errors and the store
//!   adapter traits.
//! - `flatstore-serde`: the structural encoder and decoder.
//! - this crate: execution contexts, [`Dao`], [`Reference`] and
//!   [`StoreConfig`].
//!
//! # Example
//!
//! ```rust
//! use flatstore::{transaction, Dao, DefaultContext, Model};
//! use flatstore_memory::MemoryStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     email: String,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     const KIND: &'static str = "User";
//!
//!     fn identifier(&self) -> String {
//!         self.email.clone()
//!     }
//! }
//!
//! let mut store = MemoryStore::new();
//! let users: Dao<User> = Dao::default();
//! let alice = User { email: "alice@example.com".into(), name: "Alice".into() };
//!
//! let reference = transaction(&mut store, |ctx| users.save(&alice, ctx)).unwrap();
//!
//! let mut ctx = DefaultContext::new(store);
//! assert_eq!(reference.apply(&mut ctx).unwrap(), alice);
//! ```

mod config;
mod context;
mod dao;
mod reference;

pub use config::{StoreConfig, DEFAULT_PAGE_SIZE};
pub use context::{
    batch, transaction, BatchContext, DefaultContext, ReadContext, TransactionContext,
    WriteContext,
};
pub use dao::{All, Dao, Model};
pub use reference::Reference;

// Re-export the lower layers for convenience
pub use flatstore_core::{
    path, Cursor, Datastore, Entity, EntityBuilder, Error, FlatRecord, GeoPoint, Key, KeyFactory,
    Kind, Namespace, Page, PathError, PropertyPath, PropertyValue, Query, Result, StoreBatch,
    StoreError, StoreTransaction,
};
pub use flatstore_serde::{
    decode, encode, encode_patch, from_entity, from_record, to_entity, to_patch, to_record,
    TypedReader, TypedWriter, DISCRIMINANT,
};
