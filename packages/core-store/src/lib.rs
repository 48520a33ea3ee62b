//! flatstore core: the flat property model of a schemaless key-value store.
//!
//! This layer defines the vocabulary every other layer speaks:
//! - `PropertyPath`: dot-joined address of one scalar (`address.city`)
//! - `PropertyValue`: the closed set of storable scalars, plus `Tombstone`
//! - `FlatRecord`: the ordered `(path, value)` list a typed value flattens to
//! - `Key`, `Kind`, `Namespace`, `KeyFactory`: entity identity
//! - `Entity`, `EntityBuilder`: the store-native entity and its mutation primitive
//! - `Datastore`, `StoreTransaction`, `StoreBatch`: the store adapter boundary
//!
//! # Example
//!
//! ```rust
//! use flatstore_core::{path, FlatRecord, Key, Kind, Namespace, PropertyValue};
//!
//! let mut record = FlatRecord::new();
//! record.push(path!("address.city"), PropertyValue::from("Paris"));
//! record.push(path!("nickname"), PropertyValue::Tombstone);
//!
//! let key = Key::new(Kind::new("User"), Namespace::default(), "alice");
//! let entity = record.into_entity(key);
//! assert_eq!(entity.len(), 1);
//! ```

mod entity;
mod error;
mod key;
mod path;
mod record;
mod traits;
mod value;

pub use entity::{Entity, EntityBuilder};
pub use error::{Error, Result, StoreError};
pub use key::{Key, KeyFactory, Kind, Namespace, KEY_TOKEN};
pub use path::{PathError, PropertyPath, SEPARATOR};
pub use record::FlatRecord;
pub use traits::{Cursor, Datastore, Page, Query, StoreBatch, StoreTransaction};
pub use value::{GeoPoint, PropertyValue, GEO_POINT_TOKEN};
