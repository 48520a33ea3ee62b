//! Typed references between stored records.
//!
//! A [`Reference`] is stored as a single key property and resolved on
//! demand through any read context.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use flatstore_core::{Error, Key, Result};
use flatstore_serde::from_entity;

use crate::context::ReadContext;

/// A typed handle to a stored entity.
///
/// Holds only the key; nothing is fetched until [`apply`](Self::apply).
/// Two references are equal when their keys are. Inside a record a
/// reference is stored as a single key property.
pub struct Reference<T> {
    key: Key,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Reference<T> {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn into_key(self) -> Key {
        self.key
    }
}

impl<T: DeserializeOwned> Reference<T> {
    /// Load and decode the referenced entity.
    ///
    /// Every call fetches from the context again. Fails with
    /// [`Error::NotFound`] when nothing is stored under the key.
    pub fn apply<C: ReadContext + ?Sized>(&self, ctx: &mut C) -> Result<T> {
        let entity = ctx
            .get(&self.key)?
            .ok_or_else(|| Error::NotFound(self.key.clone()))?;
        from_entity(&entity)
    }
}

impl<T> From<Key> for Reference<T> {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reference").field(&self.key).finish()
    }
}

impl<T> fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Reference<T> {}

impl<T> PartialOrd for Reference<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Reference<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl<T> Hash for Reference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> Serialize for Reference<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.key.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Reference<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Key::deserialize(deserializer).map(Self::new)
    }
}
