//! Transactions and batches over a [`MemoryStore`].

use std::collections::HashMap;

use tracing::debug;

use flatstore_core::{Cursor, Entity, Key, Page, Query, StoreBatch, StoreError, StoreTransaction};

use crate::store::{MemoryStore, Mutation};

/// An optimistic transaction.
///
/// Reads record the version of every entity they see. Writes are staged and
/// only reach the store at commit, which first checks that nothing read has
/// changed since (first committer wins; blind writes never conflict). A
/// commit either applies every staged mutation or none of them.
///
/// Reads see committed data only, not the transaction's own staged writes.
#[derive(Debug)]
pub struct MemoryTransaction {
    store: MemoryStore,
    reads: HashMap<Key, u64>,
    mutations: Vec<Mutation>,
    active: bool,
}

impl MemoryTransaction {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            mutations: Vec::new(),
            active: true,
        }
    }

    fn ensure_active(&self) -> Result<(), StoreError> {
        if self.active {
            Ok(())
        } else {
            Err(StoreError::AlreadyFinished)
        }
    }

    fn record_read(&mut self, key: &Key, version: u64) {
        self.reads.entry(key.clone()).or_insert(version);
    }
}

impl StoreTransaction for MemoryTransaction {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError> {
        self.ensure_active()?;
        let (entity, version) = {
            let state = self.store.state().lock();
            (state.get(key), state.version(key))
        };
        self.record_read(key, version);
        Ok(entity)
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError> {
        self.ensure_active()?;
        let (page, versions) = {
            let state = self.store.state().lock();
            let page = state.query(query, cursor)?;
            let versions: Vec<(Key, u64)> = page
                .entities
                .iter()
                .map(|e| (e.key().clone(), state.version(e.key())))
                .collect();
            (page, versions)
        };
        for (key, version) in versions {
            self.record_read(&key, version);
        }
        Ok(page)
    }

    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.mutations
            .extend(entities.into_iter().map(Mutation::Put));
        Ok(())
    }

    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.mutations.extend(keys.into_iter().map(Mutation::Delete));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.active = false;

        let mut state = self.store.state().lock();
        for (key, version) in &self.reads {
            if state.version(key) != *version {
                debug!(key = %key, "memory transaction conflict");
                return Err(StoreError::Conflict(key.clone()));
            }
        }

        let puts = self
            .mutations
            .iter()
            .filter(|m| matches!(m, Mutation::Put(_)))
            .count();
        state.reserve_writes(puts as u64)?;

        let mutations = std::mem::take(&mut self.mutations);
        debug!(mutations = mutations.len(), "memory transaction committed");
        state.apply_reserved(mutations);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_active()?;
        self.active = false;
        self.mutations.clear();
        self.reads.clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// A write-only batch.
///
/// Mutations are buffered and sent in one call to [`StoreBatch::submit`],
/// which applies them one at a time in order. A failure stops the batch;
/// mutations applied before it stay applied.
#[derive(Debug)]
pub struct MemoryBatch {
    store: MemoryStore,
    mutations: Vec<Mutation>,
}

impl MemoryBatch {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self {
            store,
            mutations: Vec::new(),
        }
    }
}

impl StoreBatch for MemoryBatch {
    fn put(&mut self, entities: Vec<Entity>) {
        self.mutations
            .extend(entities.into_iter().map(Mutation::Put));
    }

    fn delete(&mut self, keys: Vec<Key>) {
        self.mutations.extend(keys.into_iter().map(Mutation::Delete));
    }

    fn len(&self) -> usize {
        self.mutations.len()
    }

    fn submit(self) -> Result<(), StoreError> {
        let total = self.mutations.len();
        let mut state = self.store.state().lock();
        for (applied, mutation) in self.mutations.into_iter().enumerate() {
            if let Err(e) = state.apply(mutation) {
                debug!(applied, total, "memory batch stopped early");
                return Err(e);
            }
        }
        debug!(mutations = total, "memory batch submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatstore_core::{Datastore, Kind, Namespace};

    fn key(name: &str) -> Key {
        Key::new(Kind::new("User"), Namespace::default(), name)
    }

    #[test]
    fn commit_applies_staged_writes() {
        let mut store = MemoryStore::new();
        let mut tx = store.new_transaction().unwrap();

        tx.put(vec![Entity::new(key("a")), Entity::new(key("b"))])
            .unwrap();
        assert!(store.is_empty());

        tx.commit().unwrap();
        assert_eq!(store.len(), 2);
        assert!(!tx.is_active());
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let mut store = MemoryStore::new();
        let mut tx = store.new_transaction().unwrap();
        tx.put(vec![Entity::new(key("a"))]).unwrap();
        tx.rollback().unwrap();

        assert!(store.is_empty());
        assert!(matches!(tx.commit(), Err(StoreError::AlreadyFinished)));
    }

    #[test]
    fn finished_transaction_rejects_further_use() {
        let mut store = MemoryStore::new();
        let mut tx = store.new_transaction().unwrap();
        tx.commit().unwrap();

        assert!(matches!(tx.get(&key("a")), Err(StoreError::AlreadyFinished)));
        assert!(matches!(
            tx.put(vec![Entity::new(key("a"))]),
            Err(StoreError::AlreadyFinished)
        ));
    }

    #[test]
    fn conflicting_read_fails_commit() {
        let mut store = MemoryStore::with_entities(vec![Entity::new(key("a"))]);
        let mut tx = store.new_transaction().unwrap();
        assert!(tx.get(&key("a")).unwrap().is_some());

        // Another writer gets in first.
        store.put(vec![Entity::new(key("a"))]).unwrap();

        tx.put(vec![Entity::new(key("b"))]).unwrap();
        match tx.commit() {
            Err(StoreError::Conflict(k)) => assert_eq!(k, key("a")),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(!store.contains(&key("b")));
    }

    #[test]
    fn blind_writes_do_not_conflict() {
        let mut store = MemoryStore::new();
        let mut tx = store.new_transaction().unwrap();
        tx.put(vec![Entity::new(key("a"))]).unwrap();
        store.put(vec![Entity::new(key("a"))]).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn reads_of_missing_entities_are_tracked() {
        let mut store = MemoryStore::new();
        let mut tx = store.new_transaction().unwrap();
        assert!(tx.get(&key("a")).unwrap().is_none());

        store.put(vec![Entity::new(key("a"))]).unwrap();
        assert!(matches!(tx.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn commit_is_all_or_nothing_under_fault_injection() {
        let mut store = MemoryStore::new();
        store.fail_on_write(2);

        let mut tx = store.new_transaction().unwrap();
        tx.put(vec![
            Entity::new(key("a")),
            Entity::new(key("b")),
            Entity::new(key("c")),
        ])
        .unwrap();

        assert!(matches!(tx.commit(), Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn batch_applies_until_first_failure() {
        let mut store = MemoryStore::new();
        store.fail_on_write(2);

        let mut batch = store.new_batch();
        batch.put(vec![Entity::new(key("a"))]);
        batch.put(vec![Entity::new(key("b"))]);
        batch.put(vec![Entity::new(key("c"))]);
        assert_eq!(batch.len(), 3);

        assert!(matches!(batch.submit(), Err(StoreError::Unavailable(_))));
        assert!(store.contains(&key("a")));
        assert!(!store.contains(&key("b")));
        assert!(!store.contains(&key("c")));
    }

    #[test]
    fn batch_deletes() {
        let mut store = MemoryStore::with_entities(vec![Entity::new(key("a"))]);
        let mut batch = store.new_batch();
        batch.delete(vec![key("a")]);
        assert!(!batch.is_empty());
        batch.submit().unwrap();
        assert!(store.is_empty());
    }
}
