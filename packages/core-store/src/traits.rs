//! The store adapter boundary: what flatstore needs from a key-value store.
//!
//! Implementations wrap a real client (or an in-memory map for tests). Every
//! method is a blocking call; timeouts and retries belong to the adapter.

use crate::{Entity, Key, KeyFactory, Kind, Namespace, StoreError};

/// A query for every entity of one kind in one namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub kind: Kind,
    pub namespace: Namespace,
    /// Maximum entities per page. Adapters may return fewer.
    pub limit: usize,
}

impl Query {
    pub fn new(kind: Kind, namespace: Namespace, limit: usize) -> Self {
        Self {
            kind,
            namespace,
            limit,
        }
    }
}

/// Opaque position of the next page of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor(pub Vec<u8>);

/// One page of query results.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub entities: Vec<Entity>,
    /// Where the next page starts, or `None` when the query is exhausted.
    pub next: Option<Cursor>,
}

/// A store handle.
///
/// # Object Safety
///
/// Not object-safe because of the associated transaction and batch types;
/// contexts are generic over the store instead.
pub trait Datastore {
    type Transaction: StoreTransaction;
    type Batch: StoreBatch;

    /// Read one entity.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No entity is stored under the key.
    /// * `Ok(Some(entity))` - The stored entity.
    /// * `Err(StoreError)` - The store failed.
    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError>;

    /// Fetch one page of a kind/namespace query.
    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError>;

    /// Write entities in one call. Existing entities are replaced whole.
    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError>;

    /// Delete entities in one call. Missing keys are ignored.
    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError>;

    /// Begin a store-native transaction.
    fn new_transaction(&mut self) -> Result<Self::Transaction, StoreError>;

    /// Begin a write-only batch.
    fn new_batch(&mut self) -> Self::Batch;

    /// Build keys for a kind and namespace. Pure; no round trip.
    fn key_factory(&self, kind: Kind, namespace: Namespace) -> KeyFactory {
        KeyFactory::new(kind, namespace)
    }
}

/// A store-native transaction.
///
/// Writes are staged and become visible together at `commit`. A failed
/// commit leaves the store in its pre-transaction state.
pub trait StoreTransaction {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError>;

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError>;

    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError>;

    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Whether the transaction can still accept operations.
    fn is_active(&self) -> bool;
}

/// A write-only batch submitted in one round trip.
///
/// Batches have no isolation: if submission fails part-way, some of the
/// mutations may already be applied.
pub trait StoreBatch {
    fn put(&mut self, entities: Vec<Entity>);

    fn delete(&mut self, keys: Vec<Key>);

    /// Number of mutations accumulated so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn submit(self) -> Result<(), StoreError>;
}

// Blanket implementations for references and boxes

impl<T: Datastore + ?Sized> Datastore for &mut T {
    type Transaction = T::Transaction;
    type Batch = T::Batch;

    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError> {
        (**self).get(key)
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError> {
        (**self).run_query(query, cursor)
    }

    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError> {
        (**self).put(entities)
    }

    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError> {
        (**self).delete(keys)
    }

    fn new_transaction(&mut self) -> Result<Self::Transaction, StoreError> {
        (**self).new_transaction()
    }

    fn new_batch(&mut self) -> Self::Batch {
        (**self).new_batch()
    }

    fn key_factory(&self, kind: Kind, namespace: Namespace) -> KeyFactory {
        (**self).key_factory(kind, namespace)
    }
}

impl<T: StoreTransaction + ?Sized> StoreTransaction for Box<T> {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>, StoreError> {
        self.as_mut().get(key)
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page, StoreError> {
        self.as_mut().run_query(query, cursor)
    }

    fn put(&mut self, entities: Vec<Entity>) -> Result<(), StoreError> {
        self.as_mut().put(entities)
    }

    fn delete(&mut self, keys: Vec<Key>) -> Result<(), StoreError> {
        self.as_mut().delete(keys)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.as_mut().commit()
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.as_mut().rollback()
    }

    fn is_active(&self) -> bool {
        self.as_ref().is_active()
    }
}
