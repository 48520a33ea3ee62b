//! The Property Value Model: the closed set of scalars a store persists natively.

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

use crate::entity::EntityBuilder;
use crate::{Key, PropertyPath};

/// Reserved newtype-struct name under which a [`GeoPoint`] serializes.
pub const GEO_POINT_TOKEN: &str = "$flatstore::private::GeoPoint";

/// A latitude/longitude pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

struct GeoParts<'a>(&'a GeoPoint);

impl Serialize for GeoParts<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.0.latitude)?;
        tuple.serialize_element(&self.0.longitude)?;
        tuple.end()
    }
}

impl Serialize for GeoPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(GEO_POINT_TOKEN, &GeoParts(self))
    }
}

impl<'de> Deserialize<'de> for GeoPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GeoVisitor;

        impl<'de> Visitor<'de> for GeoVisitor {
            type Value = GeoPoint;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a geo point of (latitude, longitude)")
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_tuple(2, self)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let latitude = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let longitude = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                Ok(GeoPoint::new(latitude, longitude))
            }
        }

        deserializer.deserialize_newtype_struct(GEO_POINT_TOKEN, GeoVisitor)
    }
}

/// One scalar property value.
///
/// `Tombstone` carries no payload. It means "clear this property" and is
/// distinct from the property simply not appearing in a record.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Double(f64),
    GeoPoint(GeoPoint),
    Key(Key),
    Tombstone,
}

impl PropertyValue {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Double(_) => "double",
            PropertyValue::GeoPoint(_) => "geo point",
            PropertyValue::Key(_) => "key",
            PropertyValue::Tombstone => "tombstone",
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, PropertyValue::Tombstone)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as a double. Integers widen.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&Key> {
        match self {
            PropertyValue::Key(k) => Some(k),
            _ => None,
        }
    }

    /// Apply this value to an entity under construction.
    ///
    /// Scalars set the property named by `path`; a tombstone removes it.
    /// This is the only mutation an encoded record needs from a store.
    pub fn apply<B: EntityBuilder + ?Sized>(self, path: &PropertyPath, builder: &mut B) {
        let name = path.to_string();
        match self {
            PropertyValue::Tombstone => builder.remove(&name),
            value => builder.set(name, value),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{:?}", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Double(d) => write!(f, "{}", d),
            PropertyValue::GeoPoint(g) => write!(f, "({}, {})", g.latitude, g.longitude),
            PropertyValue::Key(k) => write!(f, "{}", k),
            PropertyValue::Tombstone => f.write_str("<tombstone>"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Boolean(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Integer(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<GeoPoint> for PropertyValue {
    fn from(v: GeoPoint) -> Self {
        PropertyValue::GeoPoint(v)
    }
}

impl From<Key> for PropertyValue {
    fn from(v: Key) -> Self {
        PropertyValue::Key(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, Entity, Kind, Namespace};

    fn entity() -> Entity {
        Entity::new(Key::new(Kind::new("User"), Namespace::default(), "alice"))
    }

    #[test]
    fn scalar_apply_sets_property() {
        let mut e = entity();
        PropertyValue::from("Paris").apply(&path!("address.city"), &mut e);
        assert_eq!(
            e.property("address.city"),
            Some(&PropertyValue::String("Paris".to_string()))
        );
    }

    #[test]
    fn tombstone_apply_removes_property() {
        let mut e = entity();
        PropertyValue::from(3i64).apply(&path!("age"), &mut e);
        PropertyValue::Tombstone.apply(&path!("age"), &mut e);
        assert_eq!(e.property("age"), None);
        assert!(e.is_empty());
    }

    #[test]
    fn double_accessor_widens_integers() {
        assert_eq!(PropertyValue::Integer(2).as_double(), Some(2.0));
        assert_eq!(PropertyValue::Boolean(true).as_double(), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(PropertyValue::Tombstone.kind_name(), "tombstone");
        assert_eq!(PropertyValue::from(GeoPoint::new(1.0, 2.0)).kind_name(), "geo point");
    }

    #[test]
    fn geo_point_json_shape() {
        let json = serde_json::to_value(GeoPoint::new(51.5, -0.12)).unwrap();
        assert_eq!(json, serde_json::json!([51.5, -0.12]));
        let back: GeoPoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, GeoPoint::new(51.5, -0.12));
    }
}
