//! Structural decoder: rebuilds any `Deserialize` value from a [`FlatRecord`].

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;
use tracing::trace;

use flatstore_core::{
    Entity, Error, FlatRecord, PropertyPath, PropertyValue, Result, GEO_POINT_TOKEN, KEY_TOKEN,
};

use crate::variant;

/// Rebuild a `T` from the pairs of `record` found under `prefix`.
///
/// Fails with [`Error::Serialization`] when a required property is absent,
/// has the wrong kind, or no enum alternative matches.
pub fn decode<T: DeserializeOwned>(record: &FlatRecord, prefix: &PropertyPath) -> Result<T> {
    let index = PropertyIndex::new(record);
    trace!(prefix = %prefix, properties = record.len(), "decoding record");
    T::deserialize(Decoder::new(&index, prefix.clone())).map_err(|e| e.at(prefix))
}

/// Rebuild a `T` from the root of `record`.
pub fn from_record<T: DeserializeOwned>(record: &FlatRecord) -> Result<T> {
    decode(record, &PropertyPath::root())
}

/// Rebuild a `T` from the properties of a stored entity.
pub fn from_entity<T: DeserializeOwned>(entity: &Entity) -> Result<T> {
    from_record(&FlatRecord::from_entity(entity)?)
}

/// Sorted view of a record. The last pair for a repeated path wins.
///
/// Paths order segment by segment, so every descendant of a path sorts
/// directly after it; prefix lookups are range scans.
pub(crate) struct PropertyIndex<'a> {
    entries: BTreeMap<&'a PropertyPath, &'a PropertyValue>,
}

impl<'a> PropertyIndex<'a> {
    pub(crate) fn new(record: &'a FlatRecord) -> Self {
        let mut entries = BTreeMap::new();
        for (path, value) in record.iter() {
            entries.insert(path, value);
        }
        Self { entries }
    }

    /// The value stored at exactly `path`.
    pub(crate) fn get(&self, path: &PropertyPath) -> Option<&'a PropertyValue> {
        self.entries.get(path).copied()
    }

    fn from(&self, path: &PropertyPath) -> impl Iterator<Item = &'a PropertyPath> + '_ {
        let path = path.clone();
        self.entries
            .range::<PropertyPath, _>((Bound::Included(&path), Bound::Unbounded))
            .map(|(p, _)| *p)
            .take_while(move |p| p.has_prefix(&path))
    }

    /// Whether `path` or anything nested under it is present.
    pub(crate) fn exists(&self, path: &PropertyPath) -> bool {
        self.from(path).next().is_some()
    }

    /// Whether anything is nested strictly under `path`.
    pub(crate) fn has_descendants(&self, path: &PropertyPath) -> bool {
        self.from(path).any(|p| p.len() > path.len())
    }

    /// Distinct segments directly under `path`, in sorted order.
    pub(crate) fn children(&self, path: &PropertyPath) -> Vec<String> {
        let depth = path.len();
        let mut children: Vec<String> = Vec::new();
        for p in self.from(path) {
            if let Some(segment) = p.segments().get(depth) {
                if children.last() != Some(segment) {
                    children.push(segment.clone());
                }
            }
        }
        children
    }
}

/// A `serde::Deserializer` positioned at one path of a record.
pub(crate) struct Decoder<'a> {
    index: &'a PropertyIndex<'a>,
    path: PropertyPath,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(index: &'a PropertyIndex<'a>, path: PropertyPath) -> Self {
        Self { index, path }
    }

    pub(crate) fn path(&self) -> &PropertyPath {
        &self.path
    }

    pub(crate) fn index(&self) -> &'a PropertyIndex<'a> {
        self.index
    }

    pub(crate) fn at(&self, path: PropertyPath) -> Self {
        Self {
            index: self.index,
            path,
        }
    }

    fn missing(&self) -> Error {
        Error::serialization(&self.path, "missing property")
    }

    fn mismatch(&self, expected: &str, found: &PropertyValue) -> Error {
        Error::serialization(
            &self.path,
            format!("expected {}, found {}", expected, found.kind_name()),
        )
    }

    /// The scalar stored at exactly this path.
    fn scalar(&self) -> Result<&'a PropertyValue> {
        self.index.get(&self.path).ok_or_else(|| self.missing())
    }

    fn integer(&self) -> Result<i64> {
        match self.scalar()? {
            PropertyValue::Integer(i) => Ok(*i),
            other => Err(self.mismatch("integer", other)),
        }
    }

    fn double(&self) -> Result<f64> {
        match self.scalar()? {
            PropertyValue::Double(d) => Ok(*d),
            PropertyValue::Integer(i) => Ok(*i as f64),
            other => Err(self.mismatch("double", other)),
        }
    }

    fn string(&self) -> Result<String> {
        match self.scalar()? {
            PropertyValue::String(s) => Ok(s.clone()),
            other => Err(self.mismatch("string", other)),
        }
    }

    fn visit_integer<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let i = self.integer()?;
        visitor.visit_i64(i)
    }

    fn list<'de, V: Visitor<'de>>(self, len: Option<usize>, visitor: V) -> Result<V::Value> {
        let path = self.path.clone();
        visitor
            .visit_seq(ListAccess {
                decoder: self,
                next: 0,
                len,
            })
            .map_err(|e| e.at(path))
    }

    fn children_map<'de, V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let keys = self.index.children(&self.path);
        let path = self.path.clone();
        visitor
            .visit_map(ChildAccess {
                decoder: self,
                keys: keys.into_iter(),
                current: None,
            })
            .map_err(|e| e.at(path))
    }
}

impl<'de> de::Deserializer<'de> for Decoder<'_> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let Some(value) = self.index.get(&self.path) else {
            let children = self.index.children(&self.path);
            if children.is_empty() {
                // Units encode to nothing, so nothing at all reads as one.
                // Typed scalars still report the missing property.
                return visitor.visit_unit();
            }
            let listlike = children.iter().any(|c| c == "0")
                && children.iter().all(|c| c.parse::<usize>().is_ok());
            return if listlike {
                self.list(None, visitor)
            } else {
                self.children_map(visitor)
            };
        };

        let result: Result<V::Value> = match value {
            PropertyValue::String(s) => visitor.visit_string(s.clone()),
            PropertyValue::Integer(i) => visitor.visit_i64(*i),
            PropertyValue::Boolean(b) => visitor.visit_bool(*b),
            PropertyValue::Double(d) => visitor.visit_f64(*d),
            PropertyValue::Tombstone => visitor.visit_none(),
            PropertyValue::GeoPoint(g) => visitor.visit_seq(de::value::SeqDeserializer::<_, Error>::new(
                vec![g.latitude, g.longitude].into_iter(),
            )),
            PropertyValue::Key(k) => visitor.visit_seq(de::value::SeqDeserializer::<_, Error>::new(
                vec![
                    k.kind().to_string(),
                    k.namespace().to_string(),
                    k.name().to_string(),
                ]
                .into_iter(),
            )),
        };
        result.map_err(|e| e.at(&self.path))
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.scalar()? {
            PropertyValue::Boolean(b) => visitor.visit_bool(*b),
            other => Err(self.mismatch("boolean", other)),
        }
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.visit_integer(visitor)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let d = self.double()?;
        visitor.visit_f64(d)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.string()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(Error::serialization(
                &self.path,
                "expected a single-character string",
            )),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.string()?;
        visitor.visit_string(s)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.list(None, visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.list(None, visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let present = match self.index.get(&self.path) {
            Some(PropertyValue::Tombstone) => false,
            Some(_) => true,
            None => self.index.has_descendants(&self.path),
        };
        if present {
            visitor.visit_some(self)
        } else {
            visitor.visit_none()
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        match name {
            KEY_TOKEN => match self.scalar()? {
                PropertyValue::Key(k) => {
                    let parts = vec![
                        k.kind().to_string(),
                        k.namespace().to_string(),
                        k.name().to_string(),
                    ];
                    visitor
                        .visit_newtype_struct(de::value::SeqDeserializer::<_, Error>::new(
                            parts.into_iter(),
                        ))
                }
                other => Err(self.mismatch("key", other)),
            },
            GEO_POINT_TOKEN => match self.scalar()? {
                PropertyValue::GeoPoint(g) => {
                    let parts = vec![g.latitude, g.longitude];
                    visitor
                        .visit_newtype_struct(de::value::SeqDeserializer::<_, Error>::new(
                            parts.into_iter(),
                        ))
                }
                other => Err(self.mismatch("geo point", other)),
            },
            _ => visitor.visit_newtype_struct(self),
        }
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.list(None, visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        self.list(Some(len), visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.list(Some(len), visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.children_map(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let path = self.path.clone();
        visitor
            .visit_map(FieldAccess {
                decoder: self,
                fields: fields.iter(),
                current: None,
            })
            .map_err(|e| e.at(path))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        variant::dispatch(self, variants, visitor)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

/// Elements at `path.0`, `path.1`, ...
///
/// Without a fixed length the list ends at the first index with nothing
/// stored under it, so a gap truncates the list. Present elements that fail
/// to decode are errors, not the end of the list.
struct ListAccess<'a> {
    decoder: Decoder<'a>,
    next: usize,
    len: Option<usize>,
}

impl<'de> de::SeqAccess<'de> for ListAccess<'_> {
    type Error = Error;

    fn next_element_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<Option<S::Value>> {
        let path = self.decoder.path.index(self.next);
        match self.len {
            Some(len) if self.next >= len => return Ok(None),
            Some(_) => {}
            None if !self.decoder.index.exists(&path) => return Ok(None),
            None => {}
        }
        self.next += 1;
        let element = self.decoder.at(path.clone());
        seed.deserialize(element).map(Some).map_err(|e| e.at(path))
    }

    fn size_hint(&self) -> Option<usize> {
        self.len.map(|len| len.saturating_sub(self.next))
    }
}

/// Declared struct fields, each offered at `path.field`.
///
/// Every field is offered whether or not anything is stored for it, so
/// absent options decode as `None`, absent lists as empty and absent
/// scalars report the exact missing path.
struct FieldAccess<'a> {
    decoder: Decoder<'a>,
    fields: std::slice::Iter<'static, &'static str>,
    current: Option<PropertyPath>,
}

impl<'de> de::MapAccess<'de> for FieldAccess<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let Some(&field) = self.fields.next() else {
            return Ok(None);
        };
        self.current = Some(
            self.decoder
                .path
                .child(field)
                .map_err(|e| Error::serialization(&self.decoder.path, e))?,
        );
        let name: de::value::StrDeserializer<'_, Error> = field.into_deserializer();
        seed.deserialize(name).map(Some)
    }

    fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        let path = self
            .current
            .take()
            .ok_or_else(|| Error::serialization(&self.decoder.path, "field value without a key"))?;
        seed.deserialize(self.decoder.at(path.clone()))
            .map_err(|e| e.at(path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

/// Every distinct child segment under `path`, for maps and self-describing reads.
struct ChildAccess<'a> {
    decoder: Decoder<'a>,
    keys: std::vec::IntoIter<String>,
    current: Option<PropertyPath>,
}

impl<'de> de::MapAccess<'de> for ChildAccess<'_> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let Some(key) = self.keys.next() else {
            return Ok(None);
        };
        self.current = Some(self.decoder.path.child(key.as_str())?);
        seed.deserialize(SegmentDeserializer(key)).map(Some)
    }

    fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value> {
        let path = self
            .current
            .take()
            .ok_or_else(|| Error::serialization(&self.decoder.path, "map value without a key"))?;
        seed.deserialize(self.decoder.at(path.clone()))
            .map_err(|e| e.at(path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

/// A map key read back from a path segment.
///
/// Segments are text; integer and boolean keys are parsed on request.
struct SegmentDeserializer(String);

macro_rules! parse_segment {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                match self.0.parse::<$ty>() {
                    Ok(v) => visitor.$visit(v),
                    Err(_) => visitor.visit_string(self.0),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for SegmentDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(self.0)
    }

    parse_segment! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct enum identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, to_record};
    use flatstore_core::{path, GeoPoint, Key, Kind, Namespace};
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};

    fn record(pairs: Vec<(&str, PropertyValue)>) -> FlatRecord {
        pairs
            .into_iter()
            .map(|(p, v)| (path!(p), v))
            .collect()
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        city: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
        address: Address,
        nickname: Option<String>,
        tags: Vec<String>,
    }

    fn alice() -> Person {
        Person {
            name: "Alice".to_string(),
            age: 30,
            address: Address {
                street: "1 Main St".to_string(),
                city: "Paris".to_string(),
            },
            nickname: Some("Al".to_string()),
            tags: vec!["admin".to_string(), "ops".to_string()],
        }
    }

    #[test]
    fn scalar_round_trips() {
        fn check<T>(value: T)
        where
            T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
        {
            let prefix = path!("value");
            let record = encode(&prefix, &value).unwrap();
            assert_eq!(decode::<T>(&record, &prefix).unwrap(), value);
        }

        check(true);
        check(-5i8);
        check(300i16);
        check(-70_000i32);
        check(i64::MIN);
        check(200u8);
        check(60_000u16);
        check(4_000_000_000u32);
        check(i64::MAX as u64);
        check(1.25f32);
        check(-3.5e10f64);
        check('λ');
        check("text".to_string());
        check(GeoPoint::new(-33.86, 151.2));
        check(Key::new(Kind::new("User"), Namespace::new("eu"), "bob"));
    }

    #[test]
    fn nested_product_round_trip() {
        let person = alice();
        let record = to_record(&person).unwrap();
        assert_eq!(
            record.get(&path!("address.city")),
            Some(&PropertyValue::from("Paris"))
        );
        assert_eq!(from_record::<Person>(&record).unwrap(), person);
    }

    #[test]
    fn missing_scalar_reports_its_path() {
        let mut person = to_record(&alice()).unwrap();
        person = person
            .into_iter()
            .filter(|(p, _)| p.to_string() != "address.city")
            .collect();

        let err = from_record::<Person>(&person).unwrap_err();
        match err {
            Error::Serialization { path, message } => {
                assert_eq!(path, "address.city");
                assert_eq!(message, "missing property");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let r = record(vec![("age", PropertyValue::from("thirty"))]);
        let err = decode::<u32>(&r, &path!("age")).unwrap_err();
        assert!(err.to_string().contains("expected integer, found string"));
    }

    #[test]
    fn narrowing_overflow_is_an_error() {
        let r = record(vec![("n", PropertyValue::Integer(300))]);
        assert!(decode::<u8>(&r, &path!("n")).unwrap_err().is_serialization());
        let r = record(vec![("n", PropertyValue::Integer(-1))]);
        assert!(decode::<u64>(&r, &path!("n")).unwrap_err().is_serialization());
    }

    #[test]
    fn integers_widen_to_doubles() {
        let r = record(vec![("x", PropertyValue::Integer(4))]);
        assert_eq!(decode::<f64>(&r, &path!("x")).unwrap(), 4.0);
    }

    #[test]
    fn option_absent_tombstone_and_present() {
        let r = record(vec![
            ("gone", PropertyValue::Tombstone),
            ("here", PropertyValue::from("x")),
        ]);
        assert_eq!(decode::<Option<String>>(&r, &path!("gone")).unwrap(), None);
        assert_eq!(decode::<Option<String>>(&r, &path!("never")).unwrap(), None);
        assert_eq!(
            decode::<Option<String>>(&r, &path!("here")).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn optional_record_is_present_through_its_fields() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Holder {
            address: Option<Address>,
        }

        let holder = Holder {
            address: Some(alice().address),
        };
        let r = to_record(&holder).unwrap();
        assert_eq!(from_record::<Holder>(&r).unwrap(), holder);

        let empty = Holder { address: None };
        let r = to_record(&empty).unwrap();
        assert_eq!(from_record::<Holder>(&r).unwrap(), empty);
    }

    #[test]
    fn list_paths_and_round_trip() {
        let r = to_record(&vec!["a", "b", "c"]).unwrap();
        let paths: Vec<String> = r.paths().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["0", "1", "2"]);
        assert_eq!(from_record::<Vec<String>>(&r).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_gap_truncates_without_error() {
        let r = record(vec![
            ("tags.0", PropertyValue::from("a")),
            ("tags.1", PropertyValue::from("b")),
            ("tags.3", PropertyValue::from("d")),
        ]);
        assert_eq!(
            decode::<Vec<String>>(&r, &path!("tags")).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn present_but_malformed_element_is_an_error() {
        let r = record(vec![
            ("0", PropertyValue::Integer(1)),
            ("1", PropertyValue::from("two")),
        ]);
        let err = from_record::<Vec<i64>>(&r).unwrap_err();
        assert!(matches!(err, Error::Serialization { ref path, .. } if path == "1"));
    }

    #[test]
    fn empty_and_absent_lists_are_indistinguishable() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Tagged {
            tags: Vec<String>,
        }

        let r = to_record(&Tagged { tags: vec![] }).unwrap();
        assert!(r.is_empty());
        assert_eq!(from_record::<Tagged>(&r).unwrap(), Tagged { tags: vec![] });
    }

    #[test]
    fn list_of_records() {
        let people = vec![alice(), alice()];
        let r = encode(&path!("people"), &people).unwrap();
        assert_eq!(
            r.get(&path!("people.1.address.street")),
            Some(&PropertyValue::from("1 Main St"))
        );
        assert_eq!(decode::<Vec<Person>>(&r, &path!("people")).unwrap(), people);
    }

    #[test]
    fn tuples_require_every_element() {
        let r = to_record(&(1i32, "x".to_string())).unwrap();
        assert_eq!(from_record::<(i32, String)>(&r).unwrap(), (1, "x".to_string()));

        let r = record(vec![("0", PropertyValue::Integer(1))]);
        assert!(from_record::<(i32, String)>(&r).is_err());
    }

    #[test]
    fn maps_round_trip() {
        let mut scores = HashMap::new();
        scores.insert("math".to_string(), 90u8);
        scores.insert("art".to_string(), 75u8);
        let r = encode(&path!("scores"), &scores).unwrap();
        assert_eq!(
            decode::<HashMap<String, u8>>(&r, &path!("scores")).unwrap(),
            scores
        );

        let mut by_id = BTreeMap::new();
        by_id.insert(7u32, "seven".to_string());
        by_id.insert(11u32, "eleven".to_string());
        let r = to_record(&by_id).unwrap();
        assert_eq!(from_record::<BTreeMap<u32, String>>(&r).unwrap(), by_id);
    }

    #[test]
    fn later_pairs_override_earlier_ones() {
        let r = record(vec![
            ("x", PropertyValue::Integer(1)),
            ("x", PropertyValue::Integer(2)),
        ]);
        assert_eq!(decode::<i64>(&r, &path!("x")).unwrap(), 2);
    }

    #[test]
    fn self_describing_reads() {
        let r = to_record(&alice()).unwrap();
        let json: serde_json::Value = from_record(&r).unwrap();
        assert_eq!(json["address"]["city"], "Paris");
        assert_eq!(json["tags"][1], "ops");
        assert_eq!(json["age"], 30);
    }

    #[test]
    fn char_requires_single_character() {
        let r = record(vec![("c", PropertyValue::from("ab"))]);
        assert!(decode::<char>(&r, &path!("c")).is_err());
    }

    #[test]
    fn from_entity_reads_stored_properties() {
        let key = Key::new(Kind::new("Person"), Namespace::default(), "alice");
        let entity = to_record(&alice()).unwrap().into_entity(key);
        assert_eq!(from_entity::<Person>(&entity).unwrap(), alice());
    }

    #[test]
    fn index_children_are_distinct_and_sorted() {
        let r = record(vec![
            ("a.y.1", PropertyValue::Integer(1)),
            ("a.x", PropertyValue::Integer(1)),
            ("a.y.0", PropertyValue::Integer(1)),
            ("ab", PropertyValue::Integer(1)),
        ]);
        let index = PropertyIndex::new(&r);
        assert_eq!(index.children(&path!("a")), vec!["x", "y"]);
        assert!(index.exists(&path!("a.y")));
        assert!(!index.exists(&path!("a.z")));
        assert!(index.has_descendants(&path!("a")));
        assert!(!index.has_descendants(&path!("ab")));
    }
}
