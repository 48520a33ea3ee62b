//! Store-native entities and the builder interface records are applied through.

use std::collections::BTreeMap;

use crate::{FlatRecord, Key, PropertyValue, SEPARATOR};

/// The mutation primitive an encoded record needs from a store.
///
/// Property names are rendered property paths (`address.city`).
pub trait EntityBuilder {
    /// Set a property, replacing any previous value.
    fn set(&mut self, name: String, value: PropertyValue);

    /// Remove a property, and anything nested under it, if present.
    fn remove(&mut self, name: &str);
}

/// A raw stored entity: a key plus its flat properties.
///
/// Entities never hold tombstones; applying a tombstone removes the
/// property instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, PropertyValue>,
}

impl Entity {
    /// An entity with no properties.
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Apply every pair of a record in order.
    ///
    /// Used for property updates: tombstones in `record` clear properties
    /// that were set previously. Properties not mentioned are left untouched.
    pub fn apply(&mut self, record: &FlatRecord) {
        for (path, value) in record.iter() {
            value.clone().apply(path, self);
        }
    }
}

impl EntityBuilder for Entity {
    fn set(&mut self, name: String, value: PropertyValue) {
        if value.is_tombstone() {
            self.properties.remove(&name);
        } else {
            self.properties.insert(name, value);
        }
    }

    /// The root path (`""`) holds every property, so removing it clears
    /// the entity.
    fn remove(&mut self, name: &str) {
        if name.is_empty() {
            self.properties.clear();
            return;
        }
        let nested = format!("{}{}", name, SEPARATOR);
        self.properties
            .retain(|k, _| k != name && !k.starts_with(&nested));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{path, Kind, Namespace};

    fn key() -> Key {
        Key::new(Kind::new("User"), Namespace::default(), "alice")
    }

    #[test]
    fn apply_patches_existing_properties() {
        let mut entity = Entity::new(key());
        entity.set("name".to_string(), PropertyValue::from("Alice"));
        entity.set("nickname".to_string(), PropertyValue::from("Al"));

        let mut patch = FlatRecord::new();
        patch.push(path!("name"), PropertyValue::from("Alicia"));
        patch.push(path!("nickname"), PropertyValue::Tombstone);
        entity.apply(&patch);

        assert_eq!(entity.property("name"), Some(&PropertyValue::from("Alicia")));
        assert_eq!(entity.property("nickname"), None);
        assert_eq!(entity.len(), 1);
    }

    #[test]
    fn remove_clears_nested_properties() {
        let mut entity = Entity::new(key());
        entity.set("address.city".to_string(), PropertyValue::from("Paris"));
        entity.set("address.zip".to_string(), PropertyValue::from("75001"));
        entity.set("addressee".to_string(), PropertyValue::from("Bob"));

        entity.remove("address");
        assert_eq!(entity.len(), 1);
        assert!(entity.property("addressee").is_some());
    }

    #[test]
    fn removing_the_root_clears_everything() {
        let mut entity = Entity::new(key());
        entity.set("name".to_string(), PropertyValue::from("Alice"));
        entity.set("address.city".to_string(), PropertyValue::from("Paris"));

        let mut patch = FlatRecord::new();
        patch.push(path!(""), PropertyValue::Tombstone);
        entity.apply(&patch);
        assert!(entity.is_empty());
    }

    #[test]
    fn set_never_stores_tombstones() {
        let mut entity = Entity::new(key());
        entity.set("gone".to_string(), PropertyValue::Tombstone);
        assert!(entity.is_empty());
    }
}
