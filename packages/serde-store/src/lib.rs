//! Serde integration for flatstore.
//!
//! Any `Serialize` value can be flattened into a [`FlatRecord`] of
//! `(PropertyPath, PropertyValue)` pairs, and any `Deserialize` value can be
//! rebuilt from one. The serde data model is the type description: structs,
//! lists, maps, options and enums are all handled structurally, with no
//! per-type code.
//!
//! - [`encode`] / [`to_record`] / [`to_entity`]: the structural encoder
//! - [`encode_patch`] / [`to_patch`]: records that replace whole lists, maps
//!   and enums when applied over a stored entity
//! - [`decode`] / [`from_record`] / [`from_entity`]: the structural decoder
//! - [`variant`]: how enums are written and read back
//! - [`TypedReader`] / [`TypedWriter`]: typed access to a raw [`Datastore`]
//!
//! # Example
//!
//! ```rust
//! use flatstore_core::{path, PropertyValue};
//! use flatstore_serde::{from_record, to_record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Address {
//!     street: String,
//!     city: String,
//! }
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     address: Address,
//! }
//!
//! let user = User {
//!     name: "Alice".into(),
//!     address: Address { street: "1 Main St".into(), city: "Paris".into() },
//! };
//! let record = to_record(&user).unwrap();
//! assert_eq!(record.get(&path!("address.city")), Some(&PropertyValue::from("Paris")));
//! assert_eq!(from_record::<User>(&record).unwrap(), user);
//! ```

mod decoder;
mod encoder;
mod typed;
pub mod variant;

pub use decoder::{decode, from_entity, from_record};
pub use encoder::{encode, encode_patch, to_entity, to_patch, to_record};
pub use typed::{TypedReader, TypedWriter};
pub use variant::DISCRIMINANT;

// Re-export core types for convenience
pub use flatstore_core::{
    Datastore, Entity, Error, FlatRecord, GeoPoint, Key, PropertyPath, PropertyValue, Result,
};
