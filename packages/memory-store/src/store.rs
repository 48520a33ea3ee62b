use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use flatstore_core::{Cursor, Datastore, Entity, Key, Page, Query, StoreError};

use crate::transaction::{MemoryBatch, MemoryTransaction};

/// A staged write, replayed by batches and transaction commits.
#[derive(Clone, Debug)]
pub(crate) enum Mutation {
    Put(Entity),
    Delete(Key),
}

#[derive(Debug, Default)]
pub(crate) struct State {
    entities: BTreeMap<Key, Entity>,
    /// Bumped on every put or delete; survives deletion.
    versions: HashMap<Key, u64>,
    /// Entity writes applied so far, counted for fault injection.
    writes: u64,
    fail_on: Option<u64>,
}

impl State {
    pub(crate) fn version(&self, key: &Key) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    pub(crate) fn get(&self, key: &Key) -> Option<Entity> {
        self.entities.get(key).cloned()
    }

    /// Count one entity write and fail it if it is the injected one.
    fn count_write(&mut self) -> Result<(), StoreError> {
        self.writes += 1;
        if self.fail_on == Some(self.writes) {
            return Err(StoreError::Unavailable(format!(
                "injected failure on write {}",
                self.writes
            )));
        }
        Ok(())
    }

    /// Reserve `count` entity writes at once, failing if the injected write
    /// falls among them. Nothing is applied on failure.
    pub(crate) fn reserve_writes(&mut self, count: u64) -> Result<(), StoreError> {
        let first = self.writes + 1;
        self.writes += count;
        match self.fail_on {
            Some(n) if n >= first && n <= self.writes => Err(StoreError::Unavailable(format!(
                "injected failure on write {}",
                n
            ))),
            _ => Ok(()),
        }
    }

    fn store(&mut self, entity: Entity) {
        *self.versions.entry(entity.key().clone()).or_insert(0) += 1;
        self.entities.insert(entity.key().clone(), entity);
    }

    fn remove(&mut self, key: &Key) {
        if self.entities.remove(key).is_some() {
            *self.versions.entry(key.clone()).or_insert(0) += 1;
        }
    }

    /// Apply one mutation, counting it if it writes an entity.
    pub(crate) fn apply(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::Put(entity) => {
                self.count_write()?;
                self.store(entity);
            }
            Mutation::Delete(key) => self.remove(&key),
        }
        Ok(())
    }

    /// Apply mutations whose writes were already reserved.
    pub(crate) fn apply_reserved(&mut self, mutations: Vec<Mutation>) {
        for mutation in mutations {
            match mutation {
                Mutation::Put(entity) => self.store(entity),
                Mutation::Delete(key) => self.remove(&key),
            }
        }
    }

    pub(crate) fn query(&self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError> {
        let offset = match cursor {
            Some(cursor) => decode_cursor(cursor)?,
            None => 0,
        };

        let mut matching = self
            .entities
            .values()
            .filter(|e| e.key().kind() == &query.kind && e.key().namespace() == &query.namespace)
            .skip(offset);

        let limit = if query.limit == 0 {
            usize::MAX
        } else {
            query.limit
        };
        let entities: Vec<Entity> = matching.by_ref().take(limit).cloned().collect();
        let next = if matching.next().is_some() {
            Some(encode_cursor(offset + entities.len()))
        } else {
            None
        };

        debug!(
            kind = %query.kind,
            offset,
            entities = entities.len(),
            more = next.is_some(),
            "memory store query page"
        );
        Ok(Page { entities, next })
    }
}

fn encode_cursor(offset: usize) -> Cursor {
    Cursor((offset as u64).to_be_bytes().to_vec())
}

fn decode_cursor(cursor: &Cursor) -> Result<usize, StoreError> {
    let bytes: [u8; 8] = cursor
        .0
        .as_slice()
        .try_into()
        .map_err(|_| StoreError::Other("invalid cursor".to_string()))?;
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| StoreError::Other("invalid cursor".to_string()))
}

/// An in-memory datastore.
///
/// Cloning a `MemoryStore` yields another handle onto the same data, so
/// several contexts can share one store.
///
/// Query pages list the entities of one kind and namespace ordered by key
/// name. Fault injection counts every entity put that reaches the store,
/// whether from a direct write, a batch submit or a transaction commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entities`.
    ///
    /// Seeding does not count towards fault injection.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            for entity in entities {
                state.store(entity);
            }
        }
        store
    }

    /// Make the `n`-th entity write from now on (1-based) fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_on_write(&self, n: u64) {
        let mut state = self.state.lock();
        state.fail_on = Some(state.writes + n);
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.state.lock().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.state.lock().entities.contains_key(key)
    }

    /// A snapshot of every stored entity, in key order.
    pub fn entities(&self) -> Vec<Entity> {
        self.state.lock().entities.values().cloned().collect()
    }

    pub(crate) fn state(&self) -> &Arc<Mutex<State>> {
        &self.state
    }
}

impl Datastore for MemoryStore {
    type Transaction = MemoryTransaction;
    type Batch = MemoryBatch;

    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError> {
        Ok(self.state.lock().get(key))
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError> {
        self.state.lock().query(query, cursor)
    }

    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        for entity in entities {
            state.apply(Mutation::Put(entity))?;
        }
        Ok(())
    }

    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        for key in keys {
            state.apply(Mutation::Delete(key))?;
        }
        Ok(())
    }

    fn new_transaction(&mut self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction::new(self.clone()))
    }

    fn new_batch(&mut self) -> MemoryBatch {
        MemoryBatch::new(self.clone())
    }
}
