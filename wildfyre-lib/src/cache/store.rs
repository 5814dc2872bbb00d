//! Per-kind entity store backed by DashMap

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Instant;

use super::Entity;

/// The keyed container of cached entities of one kind.
///
/// Thread-safe; background refreshes and foreground lookups may populate it
/// concurrently. A key maps to at most one entity, the last one put.
///
/// # Example
///
/// ```ignore
/// let user = client.users().get_cached(&42);
/// let evicted = client.users().remove_if(|_, user| user.is_banned());
/// ```
pub struct Store<K, E> {
    entries: DashMap<K, Arc<E>>,
}

impl<K: Eq + Hash + Clone, E> Store<K, E> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached entity for `key`. Never contacts the server.
    pub fn get_cached(&self, key: &K) -> Option<Arc<E>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the cached entity for `key`, creating and inserting it with `create` if absent.
    pub fn get_or_create(&self, key: K, create: impl FnOnce() -> E) -> Arc<E> {
        Arc::clone(self.entries.entry(key).or_insert_with(|| Arc::new(create())).value())
    }

    /// Stores `entity` under `key`, returning the entity it replaced.
    pub fn put(&self, key: K, entity: Arc<E>) -> Option<Arc<E>> {
        self.entries.insert(key, entity)
    }

    /// Removes whatever is stored under `key`.
    pub fn remove(&self, key: &K) -> Option<Arc<E>> {
        self.entries.remove(key).map(|(_, entity)| entity)
    }

    /// Removes `entity` from `key`, unless the key already holds another instance.
    ///
    /// Returns `true` if it was removed.
    pub fn remove_entity(&self, key: &K, entity: &E) -> bool {
        self.entries
            .remove_if(key, |_, stored| std::ptr::eq(Arc::as_ptr(stored), entity))
            .is_some()
    }

    /// Removes every entity matching `predicate`.
    ///
    /// Returns the number of entities removed.
    pub fn remove_if(&self, mut predicate: impl FnMut(&K, &E) -> bool) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, entity| {
            if predicate(key, entity) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Removes every entity.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of cached entities, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a snapshot of the cached keys.
    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns a snapshot of the cached entities.
    pub fn values(&self) -> Vec<Arc<E>> {
        self.entries.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl<K: Eq + Hash + Clone, E: Entity> Store<K, E> {
    /// Removes every entity that is stale at `now`.
    ///
    /// `now` is captured once by the caller so a slow sweep judges every
    /// entity by the same clock.
    pub fn clean_at(&self, now: Instant) -> usize {
        self.remove_if(|_, entity| !entity.is_valid_at(now))
    }

    /// Removes every stale entity.
    pub fn clean(&self) -> usize {
        self.clean_at(Instant::now())
    }
}

impl<K: Eq + Hash + Clone, E> Default for Store<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, E> fmt::Debug for Store<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.entries.len())
            .finish()
    }
}
