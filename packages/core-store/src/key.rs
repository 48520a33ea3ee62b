//! Kinds, namespaces and keys.

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// Reserved newtype-struct name under which a [`Key`] serializes.
///
/// Record encoders look for this name and store the key as a single
/// `PropertyValue::Key` instead of flattening its parts.
pub const KEY_TOKEN: &str = "$flatstore::private::Key";

/// Store-level type name of a root record type.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kind(String);

impl Kind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Store partition. The empty namespace is the default partition.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the default (empty) partition.
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of one stored entity: `(Kind, Namespace, name)`.
///
/// Keys are opaque to the record encoder. They are produced by a
/// [`KeyFactory`] and stored inside records as `PropertyValue::Key`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
    kind: Kind,
    namespace: Namespace,
    name: String,
}

impl Key {
    pub fn new(kind: Kind, namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The identifier of the entity within its kind and namespace.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_default() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}({})/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Wire form of a key: a three-element tuple wrapped in the reserved newtype.
struct KeyParts<'a>(&'a Key);

impl Serialize for KeyParts<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(self.0.kind.as_str())?;
        tuple.serialize_element(self.0.namespace.as_str())?;
        tuple.serialize_element(&self.0.name)?;
        tuple.end()
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(KEY_TOKEN, &KeyParts(self))
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl<'de> Visitor<'de> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a key of (kind, namespace, name)")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_tuple(3, self)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let kind: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let namespace: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let name: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                Ok(Key::new(Kind(kind), Namespace(namespace), name))
            }
        }

        deserializer.deserialize_newtype_struct(KEY_TOKEN, KeyVisitor)
    }
}

/// Builds keys for one `(Kind, Namespace)` pair.
///
/// Key construction is pure: no store round trip is involved, and the same
/// identifier always yields an equal key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFactory {
    kind: Kind,
    namespace: Namespace,
}

impl KeyFactory {
    pub fn new(kind: Kind, namespace: Namespace) -> Self {
        Self { kind, namespace }
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn new_key(&self, identifier: impl Into<String>) -> Key {
        Key::new(self.kind.clone(), self.namespace.clone(), identifier)
    }
}
