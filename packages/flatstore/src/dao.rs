//! Typed data access objects.

use std::iter::FusedIterator;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use flatstore_core::{Cursor, Entity, Error, Key, KeyFactory, Kind, Namespace, Query, Result};
use flatstore_serde::{from_entity, to_entity, to_patch};

use crate::config::StoreConfig;
use crate::context::{ReadContext, WriteContext};
use crate::reference::Reference;

/// A record type that can be stored through a [`Dao`].
///
/// ```rust
/// use flatstore::Model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     email: String,
///     name: String,
/// }
///
/// impl Model for User {
///     const KIND: &'static str = "User";
///
///     fn identifier(&self) -> String {
///         self.email.clone()
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned {
    /// Kind every entity of this type is stored under.
    const KIND: &'static str;

    /// The identifier naming this record's key. Must be stable: the same
    /// record always yields the same identifier.
    fn identifier(&self) -> String;
}

/// Typed access to every entity of one kind in one namespace.
pub struct Dao<T> {
    keys: KeyFactory,
    config: StoreConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Model> Dao<T> {
    pub fn new(namespace: impl Into<Namespace>) -> Self {
        Self::with_config(StoreConfig::default().with_namespace(namespace))
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            keys: KeyFactory::new(Kind::new(T::KIND), config.namespace.clone()),
            config,
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> &Kind {
        self.keys.kind()
    }

    pub fn namespace(&self) -> &Namespace {
        self.keys.namespace()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Key for `identifier` in this DAO's kind and namespace. Pure.
    pub fn new_key(&self, identifier: impl Into<String>) -> Key {
        self.keys.new_key(identifier)
    }

    pub fn key_of(&self, value: &T) -> Key {
        self.new_key(value.identifier())
    }

    fn entity_of(&self, value: &T) -> Result<Entity> {
        to_entity(self.key_of(value), value)
    }

    /// Lazily iterate every stored `T`.
    ///
    /// The first page is fetched here; later pages are fetched as the
    /// iterator reaches them and each entity is decoded when it is pulled.
    /// A failed page fetch or decode is yielded as an `Err`, after which the
    /// iterator ends.
    pub fn all<'c, C>(&self, ctx: &'c mut C) -> Result<All<'c, T, C>>
    where
        C: ReadContext + ?Sized,
    {
        let query = Query::new(
            self.kind().clone(),
            self.namespace().clone(),
            self.config.page_size,
        );
        let page = ctx.run_query(&query, None)?;
        debug!(kind = %query.kind, entities = page.entities.len(), "first page");
        Ok(All {
            ctx,
            query,
            buffer: page.entities.into_iter(),
            next: page.next,
            done: false,
            _marker: PhantomData,
        })
    }

    /// Encode `value` and store it under its key, replacing any previous
    /// entity.
    pub fn save<C>(&self, value: &T, ctx: &mut C) -> Result<Reference<T>>
    where
        C: WriteContext + ?Sized,
    {
        let entity = self.entity_of(value)?;
        let key = entity.key().clone();
        debug!(key = %key, properties = entity.len(), "save");
        ctx.save_all(vec![entity])?;
        Ok(Reference::new(key))
    }

    /// Save several values in one context call.
    pub fn save_all<C>(&self, values: &[T], ctx: &mut C) -> Result<Vec<Reference<T>>>
    where
        C: WriteContext + ?Sized,
    {
        let entities = values
            .iter()
            .map(|v| self.entity_of(v))
            .collect::<Result<Vec<_>>>()?;
        let references = entities
            .iter()
            .map(|e| Reference::new(e.key().clone()))
            .collect();
        debug!(kind = %self.kind(), entities = entities.len(), "save all");
        ctx.save_all(entities)?;
        Ok(references)
    }

    /// Patch the stored entity with `value`.
    ///
    /// Properties of `value` overwrite stored ones and `None` fields remove
    /// them. Lists, maps and enums are replaced as a whole, so a shrunk list
    /// or a switched variant leaves nothing stale behind. Other stored
    /// properties `value` does not mention are kept. Fails with
    /// [`Error::NotSaved`] if nothing is stored under the key.
    pub fn update<C>(&self, value: &T, ctx: &mut C) -> Result<Reference<T>>
    where
        C: ReadContext + WriteContext + ?Sized,
    {
        let key = self.key_of(value);
        let mut stored = ctx
            .get(&key)?
            .ok_or_else(|| Error::NotSaved(key.clone()))?;
        stored.apply(&to_patch(value)?);
        debug!(key = %key, properties = stored.len(), "update");
        ctx.save_all(vec![stored])?;
        Ok(Reference::new(key))
    }

    /// Load the `T` stored under `identifier`, if any.
    pub fn get<C>(&self, identifier: impl Into<String>, ctx: &mut C) -> Result<Option<T>>
    where
        C: ReadContext + ?Sized,
    {
        let key = self.new_key(identifier);
        match ctx.get(&key)? {
            Some(entity) => Ok(Some(from_entity(&entity)?)),
            None => Ok(None),
        }
    }

    /// Delete the stored entity for `value`.
    ///
    /// Fails with [`Error::NotSaved`] if nothing is stored under the key.
    pub fn delete<C>(&self, value: &T, ctx: &mut C) -> Result<()>
    where
        C: ReadContext + WriteContext + ?Sized,
    {
        let key = self.key_of(value);
        if ctx.get(&key)?.is_none() {
            return Err(Error::NotSaved(key));
        }
        debug!(key = %key, "delete");
        ctx.delete_all(vec![key])
    }

    /// Delete whatever is stored under `key`, without checking it exists.
    pub fn delete_key<C>(&self, key: Key, ctx: &mut C) -> Result<()>
    where
        C: WriteContext + ?Sized,
    {
        debug!(key = %key, "delete key");
        ctx.delete_all(vec![key])
    }
}

impl<T: Model> Default for Dao<T> {
    fn default() -> Self {
        Self::with_config(StoreConfig::default())
    }
}

impl<T> Clone for Dao<T> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Dao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish()
    }
}

/// Lazy iterator over every entity of a kind. See [`Dao::all`].
pub struct All<'c, T, C: ?Sized> {
    ctx: &'c mut C,
    query: Query,
    buffer: std::vec::IntoIter<Entity>,
    next: Option<Cursor>,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned, C: ReadContext + ?Sized> Iterator for All<'_, T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        loop {
            if self.done {
                return None;
            }

            if let Some(entity) = self.buffer.next() {
                let decoded = from_entity(&entity);
                self.done = decoded.is_err();
                return Some(decoded);
            }

            let Some(cursor) = self.next.take() else {
                self.done = true;
                return None;
            };
            match self.ctx.run_query(&self.query, Some(&cursor)) {
                Ok(page) => {
                    debug!(kind = %self.query.kind, entities = page.entities.len(), "next page");
                    self.buffer = page.entities.into_iter();
                    self.next = page.next;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T: DeserializeOwned, C: ReadContext + ?Sized> FusedIterator for All<'_, T, C> {}
