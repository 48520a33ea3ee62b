//! Sum-type dispatch.
//!
//! Two encodings are supported for enums.
//!
//! **Tagged** (the default for plain `#[derive(Serialize, Deserialize)]`
//! enums): the variant name is written as a string at `prefix._type` and
//! the payload is flattened under `prefix`. A unit variant writes only the
//! discriminant. A newtype variant writes its inner value at `prefix.0`, the
//! same place a one-element tuple variant would. Struct variants write
//! `prefix.field`, ... Decoding reads the discriminant first and hands the
//! payload to exactly that variant.
//!
//! **Legacy untagged** (`#[serde(untagged)]`): no discriminant is written.
//! Decoding tries each alternative in declaration order against the same
//! prefix and returns the first one that decodes. Alternatives with
//! identical shapes are indistinguishable and always decode as the first
//! one declared. Use this only to read data written without tags.
//!
//! ```rust
//! use flatstore_serde::{from_record, to_record};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! enum Shape {
//!     Circle { radius: f64 },
//!     Square { side: f64 },
//! }
//!
//! let record = to_record(&Shape::Square { side: 2.0 }).unwrap();
//! let names: Vec<String> = record.paths().map(ToString::to_string).collect();
//! assert_eq!(names, vec!["_type", "side"]);
//! assert_eq!(from_record::<Shape>(&record).unwrap(), Shape::Square { side: 2.0 });
//! ```

use serde::de::{self, DeserializeSeed, IntoDeserializer, Visitor};

use flatstore_core::{Error, FlatRecord, PropertyPath, PropertyValue, Result};

use crate::decoder::Decoder;

/// Segment holding the variant name of a tagged enum.
pub const DISCRIMINANT: &str = "_type";

/// Path of the discriminant for an enum stored at `path`.
pub fn discriminant_path(path: &PropertyPath) -> Result<PropertyPath> {
    Ok(path.child(DISCRIMINANT)?)
}

pub(crate) fn write_discriminant(
    record: &mut FlatRecord,
    path: &PropertyPath,
    variant: &str,
) -> Result<()> {
    record.push(
        discriminant_path(path)?,
        PropertyValue::String(variant.to_string()),
    );
    Ok(())
}

/// Read the discriminant of the enum at the decoder's path and dispatch.
pub(crate) fn dispatch<'de, V: Visitor<'de>>(
    decoder: Decoder<'_>,
    variants: &'static [&'static str],
    visitor: V,
) -> Result<V::Value> {
    let tag_path = discriminant_path(decoder.path())?;
    let variant = match decoder.index().get(&tag_path) {
        Some(PropertyValue::String(name)) => name.clone(),
        Some(other) => {
            return Err(Error::serialization(
                &tag_path,
                format!("expected variant name, found {}", other.kind_name()),
            ))
        }
        None => {
            return Err(Error::serialization(
                &tag_path,
                format!(
                    "missing discriminant; expected one of {}",
                    variants.join(", ")
                ),
            ))
        }
    };

    visitor
        .visit_enum(TaggedEnum { decoder, variant })
        .map_err(|e| e.at(tag_path))
}

struct TaggedEnum<'a> {
    decoder: Decoder<'a>,
    variant: String,
}

impl<'de, 'a> de::EnumAccess<'de> for TaggedEnum<'a> {
    type Error = Error;
    type Variant = Decoder<'a>;

    fn variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<(S::Value, Decoder<'a>)> {
        let name: de::value::StringDeserializer<Error> = self.variant.into_deserializer();
        let value = seed.deserialize(name)?;
        Ok((value, self.decoder))
    }
}

impl<'de> de::VariantAccess<'de> for Decoder<'_> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value> {
        let payload = self.path().index(0);
        seed.deserialize(self.at(payload))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_tuple(self, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode, from_entity, from_record, to_entity, to_record};
    use flatstore_core::{path, Key, Kind, Namespace};
    use serde::{Deserialize, Serialize};

    fn paths(record: &FlatRecord) -> Vec<String> {
        record.paths().map(ToString::to_string).collect()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Payment {
        Cash,
        Card(String),
        Transfer { iban: String, reference: Option<String> },
        Split(u32, u32),
    }

    #[test]
    fn tagged_variants_write_discriminant() {
        let record = encode(&path!("payment"), &Payment::Cash).unwrap();
        assert_eq!(paths(&record), vec!["payment._type"]);
        assert_eq!(
            record.get(&path!("payment._type")),
            Some(&PropertyValue::from("Cash"))
        );

        let record = encode(&path!("payment"), &Payment::Card("visa".to_string())).unwrap();
        assert_eq!(paths(&record), vec!["payment._type", "payment.0"]);

        let record = encode(&path!("payment"), &Payment::Split(1, 2)).unwrap();
        assert_eq!(
            paths(&record),
            vec!["payment._type", "payment.0", "payment.1"]
        );
    }

    #[test]
    fn tagged_variants_round_trip() {
        for payment in [
            Payment::Cash,
            Payment::Card("visa".to_string()),
            Payment::Transfer {
                iban: "FR76".to_string(),
                reference: None,
            },
            Payment::Split(3, 4),
        ] {
            let record = encode(&path!("p"), &payment).unwrap();
            let back: Payment = decode(&record, &path!("p")).unwrap();
            assert_eq!(back, payment);
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Circle { radius: f64 },
        Square { side: f64 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Event {
        Drawn(Shape),
        Cleared,
    }

    #[test]
    fn enum_inside_newtype_variant_keeps_both_discriminants() {
        let event = Event::Drawn(Shape::Square { side: 2.0 });
        let record = to_record(&event).unwrap();
        assert_eq!(paths(&record), vec!["_type", "0._type", "0.side"]);
        assert_eq!(record.get(&path!("_type")), Some(&PropertyValue::from("Drawn")));
        assert_eq!(from_record::<Event>(&record).unwrap(), event);

        let nested = encode(&path!("last"), &event).unwrap();
        assert_eq!(decode::<Event>(&nested, &path!("last")).unwrap(), event);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Note {
        Text(Option<String>),
        Pinned,
    }

    #[test]
    fn newtype_variant_holding_none_survives_an_entity() {
        let key = Key::new(Kind::new("Note"), Namespace::default(), "n1");
        for note in [Note::Text(None), Note::Text(Some("hi".to_string())), Note::Pinned] {
            let entity = to_entity(key.clone(), &note).unwrap();
            assert!(entity.property("_type").is_some());
            assert_eq!(from_entity::<Note>(&entity).unwrap(), note);
        }

        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Board {
            note: Note,
        }

        let board = Board {
            note: Note::Text(None),
        };
        let entity = to_entity(key, &board).unwrap();
        assert_eq!(
            entity.property("note._type"),
            Some(&PropertyValue::from("Text"))
        );
        assert_eq!(from_entity::<Board>(&entity).unwrap(), board);
    }

    #[test]
    fn tagged_dispatch_ignores_shape() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        enum Same {
            First { value: i64 },
            Second { value: i64 },
        }

        let record = to_record(&Same::Second { value: 1 }).unwrap();
        assert_eq!(from_record::<Same>(&record).unwrap(), Same::Second { value: 1 });
    }

    #[test]
    fn missing_discriminant_is_an_error() {
        let mut record = FlatRecord::new();
        record.push(path!("iban"), PropertyValue::from("FR76"));
        let err = from_record::<Payment>(&record).unwrap_err();
        assert!(matches!(err, Error::Serialization { ref path, .. } if path == "_type"));
    }

    #[test]
    fn unknown_variant_is_an_error() {
        let mut record = FlatRecord::new();
        record.push(path!("_type"), PropertyValue::from("Cheque"));
        assert!(from_record::<Payment>(&record).unwrap_err().is_serialization());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    enum Contact {
        Phone { number: String },
        Mail { street: String, city: String },
    }

    #[test]
    fn untagged_writes_no_discriminant() {
        let record = to_record(&Contact::Phone {
            number: "555".to_string(),
        })
        .unwrap();
        assert_eq!(paths(&record), vec!["number"]);
    }

    #[test]
    fn untagged_disjoint_shapes_recover_the_right_alternative() {
        let mail = Contact::Mail {
            street: "1 Main St".to_string(),
            city: "Paris".to_string(),
        };
        let record = to_record(&mail).unwrap();
        assert_eq!(from_record::<Contact>(&record).unwrap(), mail);

        let phone = Contact::Phone {
            number: "555".to_string(),
        };
        let record = to_record(&phone).unwrap();
        assert_eq!(from_record::<Contact>(&record).unwrap(), phone);
    }

    #[test]
    fn untagged_identical_shapes_decode_as_first_declared() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        #[serde(untagged)]
        enum Ambiguous {
            Celsius { degrees: f64 },
            Fahrenheit { degrees: f64 },
        }

        let record = to_record(&Ambiguous::Fahrenheit { degrees: 451.0 }).unwrap();
        assert_eq!(
            from_record::<Ambiguous>(&record).unwrap(),
            Ambiguous::Celsius { degrees: 451.0 }
        );

        let record = to_record(&Ambiguous::Celsius { degrees: 20.0 }).unwrap();
        assert_eq!(
            from_record::<Ambiguous>(&record).unwrap(),
            Ambiguous::Celsius { degrees: 20.0 }
        );
    }

    #[test]
    fn untagged_unit_alternative_decodes_from_nothing() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        #[serde(untagged)]
        enum Legacy {
            Named { name: String },
            Nothing,
        }

        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Holder {
            id: String,
            legacy: Legacy,
        }

        let empty = Holder {
            id: "h".to_string(),
            legacy: Legacy::Nothing,
        };
        let record = to_record(&empty).unwrap();
        assert_eq!(paths(&record), vec!["id"]);
        assert_eq!(from_record::<Holder>(&record).unwrap(), empty);

        let named = Holder {
            id: "h".to_string(),
            legacy: Legacy::Named {
                name: "old".to_string(),
            },
        };
        let record = to_record(&named).unwrap();
        assert_eq!(from_record::<Holder>(&record).unwrap(), named);
    }

    #[test]
    fn untagged_no_match_is_an_error() {
        let mut record = FlatRecord::new();
        record.push(path!("unrelated"), PropertyValue::from(1i64));
        assert!(from_record::<Contact>(&record).unwrap_err().is_serialization());
    }

    #[test]
    fn internally_tagged_enums_use_their_own_field() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind")]
        enum Event {
            Login { user: String },
            Logout { user: String, forced: bool },
        }

        let event = Event::Logout {
            user: "alice".to_string(),
            forced: true,
        };
        let record = to_record(&event).unwrap();
        assert_eq!(paths(&record), vec!["kind", "user", "forced"]);
        assert_eq!(from_record::<Event>(&record).unwrap(), event);
    }
}
