//! FlatRecord: the ordered `(path, value)` list one encoded value flattens to.

use crate::{Entity, Key, PathError, PropertyPath, PropertyValue};

/// The flattened form of one typed value.
///
/// Pairs keep insertion order, which for encoded values is field
/// declaration order, recursively. Order does not affect decoding but keeps
/// encoder output deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatRecord {
    entries: Vec<(PropertyPath, PropertyValue)>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, path: PropertyPath, value: PropertyValue) {
        self.entries.push((path, value));
    }

    /// The value at exactly `path`. When a path repeats, the last pair wins.
    pub fn get(&self, path: &PropertyPath) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PropertyPath, PropertyValue)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PropertyPath> {
        self.entries.iter().map(|(p, _)| p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a fresh entity by applying every pair onto an empty one.
    ///
    /// Tombstones produce no property, so a full write of a record with
    /// `None` fields simply omits them.
    pub fn into_entity(self, key: Key) -> Entity {
        let mut entity = Entity::new(key);
        for (path, value) in self.entries {
            value.apply(&path, &mut entity);
        }
        entity
    }

    /// Read the properties of a stored entity back as a record.
    ///
    /// Pairs come out in property-name order. Fails if a stored property
    /// name is not a valid rendered path.
    pub fn from_entity(entity: &Entity) -> Result<Self, PathError> {
        let mut record = Self::new();
        for (name, value) in entity.properties() {
            record.push(PropertyPath::parse(name)?, value.clone());
        }
        Ok(record)
    }
}

impl Extend<(PropertyPath, PropertyValue)> for FlatRecord {
    fn extend<I: IntoIterator<Item = (PropertyPath, PropertyValue)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl FromIterator<(PropertyPath, PropertyValue)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (PropertyPath, PropertyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FlatRecord {
    type Item = (PropertyPath, PropertyValue);
    type IntoIter = std::vec::IntoIter<(PropertyPath, PropertyValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
