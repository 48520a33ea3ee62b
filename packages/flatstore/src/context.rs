//! Execution contexts.
//!
//! A context decides how the reads and writes of a unit of work reach the
//! store:
//!
//! - [`DefaultContext`]: every call is its own store round trip.
//! - [`TransactionContext`]: everything is staged in a store transaction and
//!   becomes visible at commit, or not at all.
//! - [`BatchContext`]: write-only; mutations are buffered and sent in one
//!   round trip at submit. A failure may leave earlier mutations applied.
//!
//! DAO operations are generic over [`ReadContext`] and [`WriteContext`], so
//! the same code runs under any of them. A batch has no read side, so reading
//! through one does not compile.

use tracing::{debug, warn};

use flatstore_core::{
    Cursor, Datastore, Entity, Error, Key, Page, Query, Result, StoreBatch, StoreError,
    StoreTransaction,
};

/// Read access through a context.
pub trait ReadContext {
    /// Fetch one entity. `None` when nothing is stored under `key`.
    fn get(&mut self, key: &Key) -> Result<Option<Entity>>;

    /// Fetch one page of a query.
    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page>;
}

/// Write access through a context.
pub trait WriteContext {
    /// Store entities, replacing whatever was stored under their keys.
    fn save_all(&mut self, entities: Vec<Entity>) -> Result<()>;

    /// Delete entities. Missing keys are not an error.
    fn delete_all(&mut self, keys: Vec<Key>) -> Result<()>;
}

impl<C: ReadContext + ?Sized> ReadContext for &mut C {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>> {
        (**self).get(key)
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        (**self).run_query(query, cursor)
    }
}

impl<C: WriteContext + ?Sized> WriteContext for &mut C {
    fn save_all(&mut self, entities: Vec<Entity>) -> Result<()> {
        (**self).save_all(entities)
    }

    fn delete_all(&mut self, keys: Vec<Key>) -> Result<()> {
        (**self).delete_all(keys)
    }
}

/// Direct store access: one round trip per call.
///
/// ```rust
/// use flatstore::{DefaultContext, WriteContext};
/// use flatstore_core::{Entity, Key, Kind, Namespace};
/// use flatstore_memory::MemoryStore;
///
/// let store = MemoryStore::new();
/// let mut ctx = DefaultContext::new(store.clone());
/// let key = Key::new(Kind::new("User"), Namespace::default(), "alice");
/// ctx.save_all(vec![Entity::new(key.clone())]).unwrap();
/// assert!(store.contains(&key));
/// ```
#[derive(Debug)]
pub struct DefaultContext<S> {
    store: S,
}

impl<S: Datastore> DefaultContext<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: Datastore> ReadContext for DefaultContext<S> {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>> {
        Ok(self.store.get(key)?)
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        Ok(self.store.run_query(query, cursor)?)
    }
}

impl<S: Datastore> WriteContext for DefaultContext<S> {
    fn save_all(&mut self, entities: Vec<Entity>) -> Result<()> {
        debug!(target: "flatstore::context", entities = entities.len(), "save");
        Ok(self.store.put(entities)?)
    }

    fn delete_all(&mut self, keys: Vec<Key>) -> Result<()> {
        debug!(target: "flatstore::context", keys = keys.len(), "delete");
        Ok(self.store.delete(keys)?)
    }
}

/// Reads and writes staged in a store transaction.
///
/// Nothing is visible to other contexts until [`commit`](Self::commit).
/// If any staged operation fails, the store transaction is rolled back
/// immediately and the context is poisoned: every later call, commit
/// included, fails with [`StoreError::Aborted`].
///
/// Dropping an uncommitted context rolls the transaction back.
#[derive(Debug)]
pub struct TransactionContext<T: StoreTransaction> {
    tx: T,
    poisoned: bool,
}

impl<T: StoreTransaction> TransactionContext<T> {
    pub fn new(tx: T) -> Self {
        Self {
            tx,
            poisoned: false,
        }
    }

    /// Open a transaction on `store`.
    pub fn begin<S>(store: &mut S) -> Result<Self>
    where
        S: Datastore<Transaction = T>,
    {
        debug!(target: "flatstore::txn", "transaction started");
        Ok(Self::new(store.new_transaction()?))
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Run one staged operation, poisoning the context if it fails.
    fn stage<R>(
        &mut self,
        op: impl FnOnce(&mut T) -> std::result::Result<R, StoreError>,
    ) -> Result<R> {
        if self.poisoned {
            return Err(StoreError::Aborted.into());
        }
        op(&mut self.tx).map_err(|e| {
            warn!(target: "flatstore::txn", error = %e, "transaction aborted");
            self.poisoned = true;
            if self.tx.is_active() {
                if let Err(rollback) = self.tx.rollback() {
                    warn!(target: "flatstore::txn", error = %rollback, "rollback failed");
                }
            }
            Error::Database(e)
        })
    }

    /// Commit every staged write.
    pub fn commit(mut self) -> Result<()> {
        if self.poisoned {
            return Err(StoreError::Aborted.into());
        }
        self.tx.commit()?;
        debug!(target: "flatstore::txn", "transaction committed");
        Ok(())
    }

    /// Discard every staged write.
    ///
    /// Rolling back a poisoned context is a no-op.
    pub fn rollback(mut self) -> Result<()> {
        if self.tx.is_active() {
            self.tx.rollback()?;
            debug!(target: "flatstore::txn", "transaction rolled back");
        }
        Ok(())
    }
}

impl<T: StoreTransaction> Drop for TransactionContext<T> {
    fn drop(&mut self) {
        if self.tx.is_active() {
            warn!(target: "flatstore::txn", "transaction dropped without commit; rolling back");
            if let Err(e) = self.tx.rollback() {
                warn!(target: "flatstore::txn", error = %e, "rollback failed");
            }
        }
    }
}

impl<T: StoreTransaction> ReadContext for TransactionContext<T> {
    fn get(&mut self, key: &Key) -> Result<Option<Entity>> {
        self.stage(|tx| tx.get(key))
    }

    fn run_query(&mut self, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        self.stage(|tx| tx.run_query(query, cursor))
    }
}

impl<T: StoreTransaction> WriteContext for TransactionContext<T> {
    fn save_all(&mut self, entities: Vec<Entity>) -> Result<()> {
        debug!(target: "flatstore::txn", entities = entities.len(), "stage save");
        self.stage(|tx| tx.put(entities))
    }

    fn delete_all(&mut self, keys: Vec<Key>) -> Result<()> {
        debug!(target: "flatstore::txn", keys = keys.len(), "stage delete");
        self.stage(|tx| tx.delete(keys))
    }
}

/// Write-only context buffering mutations for one round trip.
///
/// [`submit`](Self::submit) sends everything at once. If it fails, some
/// mutations may already be applied: a batch gives no atomicity.
/// Dropping an unsubmitted batch discards it.
#[derive(Debug)]
pub struct BatchContext<B: StoreBatch> {
    batch: Option<B>,
}

impl<B: StoreBatch> BatchContext<B> {
    pub fn new(batch: B) -> Self {
        Self { batch: Some(batch) }
    }

    /// Start a batch on `store`.
    pub fn begin<S>(store: &mut S) -> Self
    where
        S: Datastore<Batch = B>,
    {
        Self::new(store.new_batch())
    }

    /// Number of buffered mutations.
    pub fn len(&self) -> usize {
        self.batch.as_ref().map_or(0, StoreBatch::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send every buffered mutation.
    pub fn submit(mut self) -> Result<()> {
        let batch = self.batch.take().ok_or(StoreError::AlreadyFinished)?;
        let mutations = batch.len();
        batch.submit()?;
        debug!(target: "flatstore::batch", mutations, "batch submitted");
        Ok(())
    }

    /// Drop every buffered mutation without sending anything.
    pub fn discard(mut self) {
        self.batch = None;
    }

    fn batch(&mut self) -> Result<&mut B> {
        Ok(self.batch.as_mut().ok_or(StoreError::AlreadyFinished)?)
    }
}

impl<B: StoreBatch> Drop for BatchContext<B> {
    fn drop(&mut self) {
        if let Some(batch) = &self.batch {
            if !batch.is_empty() {
                warn!(
                    target: "flatstore::batch",
                    mutations = batch.len(),
                    "batch dropped without submit; discarding"
                );
            }
        }
    }
}

impl<B: StoreBatch> WriteContext for BatchContext<B> {
    fn save_all(&mut self, entities: Vec<Entity>) -> Result<()> {
        self.batch()?.put(entities);
        Ok(())
    }

    fn delete_all(&mut self, keys: Vec<Key>) -> Result<()> {
        self.batch()?.delete(keys);
        Ok(())
    }
}

/// Run `f` in a transaction: commit when it returns `Ok`, roll back when it
/// returns `Err`.
///
/// ```rust
/// use flatstore::{transaction, WriteContext};
/// use flatstore_core::{Entity, Key, Kind, Namespace};
/// use flatstore_memory::MemoryStore;
///
/// let mut store = MemoryStore::new();
/// let key = Key::new(Kind::new("User"), Namespace::default(), "alice");
/// transaction(&mut store, |ctx| ctx.save_all(vec![Entity::new(key.clone())])).unwrap();
/// assert!(store.contains(&key));
/// ```
pub fn transaction<S, F, R>(store: &mut S, f: F) -> Result<R>
where
    S: Datastore,
    F: FnOnce(&mut TransactionContext<S::Transaction>) -> Result<R>,
{
    let mut ctx = TransactionContext::begin(store)?;
    match f(&mut ctx) {
        Ok(value) => {
            ctx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = ctx.rollback() {
                warn!(target: "flatstore::txn", error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Run `f` against a batch: submit when it returns `Ok`, discard when it
/// returns `Err`.
pub fn batch<S, F, R>(store: &mut S, f: F) -> Result<R>
where
    S: Datastore,
    F: FnOnce(&mut BatchContext<S::Batch>) -> Result<R>,
{
    let mut ctx = BatchContext::begin(store);
    match f(&mut ctx) {
        Ok(value) => {
            ctx.submit()?;
            Ok(value)
        }
        Err(e) => {
            ctx.discard();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatstore_core::{Kind, Namespace};
    use flatstore_memory::MemoryStore;

    fn key(name: &str) -> Key {
        Key::new(Kind::new("User"), Namespace::default(), name)
    }

    fn entities(names: &[&str]) -> Vec<Entity> {
        names.iter().map(|n| Entity::new(key(n))).collect()
    }

    #[test]
    fn default_context_writes_through() {
        let store = MemoryStore::new();
        let mut ctx = DefaultContext::new(store.clone());

        ctx.save_all(entities(&["a", "b"])).unwrap();
        assert_eq!(store.len(), 2);
        assert!(ctx.get(&key("a")).unwrap().is_some());

        ctx.delete_all(vec![key("a")]).unwrap();
        assert!(!store.contains(&key("a")));
    }

    #[test]
    fn default_context_wraps_store_errors() {
        let store = MemoryStore::new();
        store.fail_on_write(1);
        let mut ctx = DefaultContext::new(store);

        let err = ctx.save_all(entities(&["a"])).unwrap_err();
        assert!(matches!(err, Error::Database(StoreError::Unavailable(_))));
    }

    #[test]
    fn transaction_is_invisible_until_commit() {
        let mut store = MemoryStore::new();
        let mut ctx = TransactionContext::begin(&mut store).unwrap();
        ctx.save_all(entities(&["a"])).unwrap();
        assert!(store.is_empty());

        ctx.commit().unwrap();
        assert!(store.contains(&key("a")));
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut store = MemoryStore::new();
        {
            let mut ctx = TransactionContext::begin(&mut store).unwrap();
            ctx.save_all(entities(&["a"])).unwrap();
        }
        assert!(store.is_empty());
    }

    #[test]
    fn failed_commit_reports_database_error() {
        let mut store = MemoryStore::new();
        store.fail_on_write(2);

        let mut ctx = TransactionContext::begin(&mut store).unwrap();
        ctx.save_all(entities(&["a", "b", "c"])).unwrap();
        let err = ctx.commit().unwrap_err();
        assert!(matches!(err, Error::Database(StoreError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn transaction_helper_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        let result: Result<()> = transaction(&mut store, |ctx| {
            ctx.save_all(entities(&["a"]))?;
            Err(Error::NotSaved(key("b")))
        });

        assert!(matches!(result, Err(Error::NotSaved(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn transaction_helper_returns_closure_value() {
        let mut store = MemoryStore::new();
        let found = transaction(&mut store, |ctx| {
            ctx.save_all(entities(&["a"]))?;
            ctx.get(&key("a"))
        })
        .unwrap();

        // Reads inside a transaction see committed data only.
        assert!(found.is_none());
        assert!(store.contains(&key("a")));
    }

    #[test]
    fn batch_submits_once() {
        let mut store = MemoryStore::new();
        let mut ctx = BatchContext::begin(&mut store);
        ctx.save_all(entities(&["a", "b"])).unwrap();
        ctx.delete_all(vec![key("c")]).unwrap();
        assert_eq!(ctx.len(), 3);
        assert!(store.is_empty());

        ctx.submit().unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn batch_helper_discards_on_error() {
        let mut store = MemoryStore::new();
        let result: Result<()> = batch(&mut store, |ctx| {
            ctx.save_all(entities(&["a"]))?;
            Err(Error::NotSaved(key("a")))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn batch_failure_keeps_earlier_writes() {
        let mut store = MemoryStore::new();
        store.fail_on_write(2);

        let result = batch(&mut store, |ctx| ctx.save_all(entities(&["a", "b", "c"])));
        assert!(matches!(
            result,
            Err(Error::Database(StoreError::Unavailable(_)))
        ));
        assert!(store.contains(&key("a")));
        assert_eq!(store.len(), 1);
    }
}
