//! Structural encoder: flattens any `Serialize` value into a [`FlatRecord`].

use serde::ser::{self, Serialize, Serializer as _};
use tracing::trace;

use flatstore_core::{
    Entity, Error, FlatRecord, GeoPoint, Key, Kind, Namespace, PropertyPath, PropertyValue, Result,
    GEO_POINT_TOKEN, KEY_TOKEN,
};

use crate::variant;

/// Flatten `value` into `(path, value)` pairs rooted at `prefix`.
///
/// Struct fields land at `prefix.field` in declaration order, list
/// elements at `prefix.0`, `prefix.1`, and so on, and `None` becomes a
/// single tombstone. Enum handling is described in [`crate::variant`].
pub fn encode<T: ?Sized + Serialize>(prefix: &PropertyPath, value: &T) -> Result<FlatRecord> {
    let mut record = FlatRecord::new();
    encode_into(&mut record, prefix.clone(), value, false)?;
    trace!(prefix = %prefix, properties = record.len(), "encoded record");
    Ok(record)
}

/// Like [`encode`], but the record is meant to be applied over a stored
/// entity rather than decoded.
///
/// Every list, map and enum writes a tombstone at its own path before its
/// contents, so applying the patch replaces that whole subtree: a shorter
/// list leaves no stale tail behind and a switched variant drops the old
/// variant's fields. Other properties are patched one by one as usual.
pub fn encode_patch<T: ?Sized + Serialize>(
    prefix: &PropertyPath,
    value: &T,
) -> Result<FlatRecord> {
    let mut record = FlatRecord::new();
    encode_into(&mut record, prefix.clone(), value, true)?;
    trace!(prefix = %prefix, properties = record.len(), "encoded patch");
    Ok(record)
}

/// [`encode_patch`] at the root path.
pub fn to_patch<T: ?Sized + Serialize>(value: &T) -> Result<FlatRecord> {
    encode_patch(&PropertyPath::root(), value)
}

/// Flatten `value` at the root path.
pub fn to_record<T: ?Sized + Serialize>(value: &T) -> Result<FlatRecord> {
    encode(&PropertyPath::root(), value)
}

/// Flatten `value` into a fresh entity stored under `key`.
///
/// `None` fields are simply absent from the entity.
pub fn to_entity<T: ?Sized + Serialize>(key: Key, value: &T) -> Result<Entity> {
    Ok(to_record(value)?.into_entity(key))
}

fn encode_into<T: ?Sized + Serialize>(
    record: &mut FlatRecord,
    path: PropertyPath,
    value: &T,
    patch: bool,
) -> Result<()> {
    let at = path.clone();
    value
        .serialize(Encoder {
            record,
            path,
            patch,
        })
        .map_err(|e| e.at(at))
}

fn child(path: &PropertyPath, segment: &str) -> Result<PropertyPath> {
    path.child(segment)
        .map_err(|e| Error::serialization(path, e))
}

/// Encode a value on its own and return its scalar parts in order.
///
/// Keys and geo points serialize as tuples behind a reserved newtype name;
/// this recovers the tuple elements so they can be stored as one value.
fn capture<T: ?Sized + Serialize>(value: &T) -> Result<Vec<PropertyValue>> {
    Ok(to_record(value)?.into_iter().map(|(_, v)| v).collect())
}

fn capture_key<T: ?Sized + Serialize>(path: &PropertyPath, value: &T) -> Result<Key> {
    match capture(value)?.as_slice() {
        [PropertyValue::String(kind), PropertyValue::String(namespace), PropertyValue::String(name)] => {
            Ok(Key::new(
                Kind::new(kind.as_str()),
                Namespace::new(namespace.as_str()),
                name.as_str(),
            ))
        }
        _ => Err(Error::serialization(path, "malformed key")),
    }
}

fn capture_geo_point<T: ?Sized + Serialize>(path: &PropertyPath, value: &T) -> Result<GeoPoint> {
    match capture(value)?.as_slice() {
        [latitude, longitude] => match (latitude.as_double(), longitude.as_double()) {
            (Some(latitude), Some(longitude)) => Ok(GeoPoint::new(latitude, longitude)),
            _ => Err(Error::serialization(path, "malformed geo point")),
        },
        _ => Err(Error::serialization(path, "malformed geo point")),
    }
}

/// Render a map key as one path segment.
fn map_key_segment<T: ?Sized + Serialize>(path: &PropertyPath, key: &T) -> Result<String> {
    let mut parts = to_record(key)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some((p, value)), None) if p.is_empty() => match value {
            PropertyValue::String(s) => Ok(s),
            PropertyValue::Integer(i) => Ok(i.to_string()),
            PropertyValue::Boolean(b) => Ok(b.to_string()),
            other => Err(Error::serialization(
                path,
                format!("map keys must be strings or integers, found {}", other.kind_name()),
            )),
        },
        _ => Err(Error::serialization(
            path,
            "map keys must be strings or integers",
        )),
    }
}

struct Encoder<'r> {
    record: &'r mut FlatRecord,
    path: PropertyPath,
    patch: bool,
}

impl<'r> Encoder<'r> {
    fn emit(self, value: PropertyValue) -> Result<()> {
        self.record.push(self.path, value);
        Ok(())
    }

    /// In patch mode, drop whatever was stored under this path.
    fn clear(&mut self) {
        if self.patch {
            self.record.push(self.path.clone(), PropertyValue::Tombstone);
        }
    }

    fn tag(&mut self, variant: &str) -> Result<()> {
        self.clear();
        variant::write_discriminant(self.record, &self.path, variant)
    }

    fn sequence(self) -> SeqEncoder<'r> {
        SeqEncoder {
            record: self.record,
            path: self.path,
            patch: self.patch,
            next: 0,
        }
    }

    fn fields(self) -> StructEncoder<'r> {
        StructEncoder {
            record: self.record,
            path: self.path,
            patch: self.patch,
        }
    }

    fn unsigned(self, v: u64) -> Result<()> {
        match i64::try_from(v) {
            Ok(i) => self.emit(PropertyValue::Integer(i)),
            Err(_) => Err(Error::serialization(
                &self.path,
                format!("integer {} does not fit in 64-bit signed storage", v),
            )),
        }
    }
}

impl<'r> ser::Serializer for Encoder<'r> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqEncoder<'r>;
    type SerializeTuple = SeqEncoder<'r>;
    type SerializeTupleStruct = SeqEncoder<'r>;
    type SerializeTupleVariant = SeqEncoder<'r>;
    type SerializeMap = MapEncoder<'r>;
    type SerializeStruct = StructEncoder<'r>;
    type SerializeStructVariant = StructEncoder<'r>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.emit(PropertyValue::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.emit(PropertyValue::Integer(v))
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        match i64::try_from(v) {
            Ok(i) => self.serialize_i64(i),
            Err(_) => Err(Error::serialization(
                &self.path,
                format!("integer {} does not fit in 64-bit signed storage", v),
            )),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.unsigned(v)
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        match u64::try_from(v) {
            Ok(u) => self.unsigned(u),
            Err(_) => Err(Error::serialization(
                &self.path,
                format!("integer {} does not fit in 64-bit signed storage", v),
            )),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.emit(PropertyValue::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.emit(PropertyValue::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.emit(PropertyValue::String(v.to_string()))
    }

    fn serialize_bytes(mut self, v: &[u8]) -> Result<()> {
        // No blob kind in the property model; bytes are a list of integers.
        self.clear();
        for (i, byte) in v.iter().enumerate() {
            self.record
                .push(self.path.index(i), PropertyValue::Integer(i64::from(*byte)));
        }
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.emit(PropertyValue::Tombstone)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        mut self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        self.tag(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<()> {
        match name {
            KEY_TOKEN => {
                let key = capture_key(&self.path, value)?;
                self.emit(PropertyValue::Key(key))
            }
            GEO_POINT_TOKEN => {
                let point = capture_geo_point(&self.path, value)?;
                self.emit(PropertyValue::GeoPoint(point))
            }
            _ => value.serialize(self),
        }
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        mut self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        // Payload at `path.0`, never at `path` itself: it must not collide
        // with this variant's discriminant.
        self.tag(variant)?;
        encode_into(self.record, self.path.index(0), value, self.patch)
    }

    fn serialize_seq(mut self, _len: Option<usize>) -> Result<SeqEncoder<'r>> {
        self.clear();
        Ok(self.sequence())
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder<'r>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqEncoder<'r>> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        mut self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SeqEncoder<'r>> {
        self.tag(variant)?;
        Ok(self.sequence())
    }

    fn serialize_map(mut self, _len: Option<usize>) -> Result<MapEncoder<'r>> {
        self.clear();
        Ok(MapEncoder {
            record: self.record,
            path: self.path,
            patch: self.patch,
            pending: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<StructEncoder<'r>> {
        Ok(self.fields())
    }

    fn serialize_struct_variant(
        mut self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<StructEncoder<'r>> {
        self.tag(variant)?;
        Ok(self.fields())
    }
}

/// Lists, tuples and tuple variants: element `i` at `path.i`.
pub(crate) struct SeqEncoder<'r> {
    record: &'r mut FlatRecord,
    path: PropertyPath,
    patch: bool,
    next: usize,
}

impl SeqEncoder<'_> {
    fn element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let path = self.path.index(self.next);
        self.next += 1;
        encode_into(self.record, path, value, self.patch)
    }
}

impl ser::SerializeSeq for SeqEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for SeqEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for SeqEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for SeqEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.element(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Maps: each key becomes one segment under `path`.
pub(crate) struct MapEncoder<'r> {
    record: &'r mut FlatRecord,
    path: PropertyPath,
    patch: bool,
    pending: Option<PropertyPath>,
}

impl ser::SerializeMap for MapEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        let segment = map_key_segment(&self.path, key)?;
        self.pending = Some(child(&self.path, &segment)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let path = self
            .pending
            .take()
            .ok_or_else(|| Error::serialization(&self.path, "map value without a key"))?;
        encode_into(self.record, path, value, self.patch)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Structs and struct variants: each field at `path.field`.
pub(crate) struct StructEncoder<'r> {
    record: &'r mut FlatRecord,
    path: PropertyPath,
    patch: bool,
}

impl StructEncoder<'_> {
    fn field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        let path = child(&self.path, key)?;
        encode_into(self.record, path, value, self.patch)
    }
}

impl ser::SerializeStruct for StructEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for StructEncoder<'_> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field(key, value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
