//! Typed get and put extension traits for raw datastores.

use serde::de::DeserializeOwned;
use serde::Serialize;

use flatstore_core::{Datastore, Key, Result};

use crate::{from_entity, to_entity};

/// Extension trait for typed reads.
///
/// Implemented for every [`Datastore`]. Reads the entity stored under a key
/// and decodes its properties into a Rust type.
///
/// ```rust,ignore
/// use flatstore_serde::TypedReader;
///
/// let user: Option<User> = store.get_as(&key)?;
/// ```
pub trait TypedReader: Datastore {
    /// Fetch the entity at `key` and decode it. `None` when nothing is stored.
    fn get_as<T: DeserializeOwned>(&mut self, key: &Key) -> Result<Option<T>> {
        let Some(entity) = self.get(key)? else {
            return Ok(None);
        };
        Ok(Some(from_entity(&entity)?))
    }

    /// Fetch the entity at `key` as a `serde_json::Value`.
    fn get_json(&mut self, key: &Key) -> Result<Option<serde_json::Value>> {
        self.get_as(key)
    }
}

impl<D: Datastore + ?Sized> TypedReader for D {}

/// Extension trait for typed writes.
pub trait TypedWriter: Datastore {
    /// Encode `data` and store it under `key`, replacing any previous entity.
    fn put_as<T: Serialize + ?Sized>(&mut self, key: Key, data: &T) -> Result<()> {
        let entity = to_entity(key, data)?;
        self.put(vec![entity])?;
        Ok(())
    }
}

impl<D: Datastore + ?Sized> TypedWriter for D {}
