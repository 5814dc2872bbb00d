//! Entity cache
//!
//! Every remote object the client knows about is an [`Entity`] held in the
//! [`Store`] of its kind. Entities remember when they were last used; the
//! [`ExpirationPolicy`] of their kind decides when that is too long ago.
//! The refresh coordinator decides, for each lookup, whether the entity is
//! fetched inline, refreshed in the background, or returned as-is.

mod config;
mod policy;
pub(crate) mod refresh;
mod store;

pub use config::*;
pub use policy::*;
pub use store::*;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::WildFyreClient;
use crate::error::EntityKey;
use crate::error::Error;

/// Usage tracking shared by every entity.
///
/// An entity is "new" until it is touched for the first time after
/// construction; it is "valid" while less than the policy's TTL has elapsed
/// since it was last touched.
#[derive(Debug)]
pub struct Freshness {
    last_used: Mutex<Instant>,
    is_new: AtomicBool,
    policy: Arc<ExpirationPolicy>,
}

impl Freshness {
    /// Creates the freshness of a never-populated entity.
    pub fn new(policy: Arc<ExpirationPolicy>) -> Self {
        Self {
            last_used: Mutex::new(Instant::now()),
            is_new: AtomicBool::new(true),
            policy,
        }
    }

    /// Returns `true` if less than the TTL elapsed between the last use and `now`.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_used.lock()) < self.policy.ttl()
    }

    /// Returns `true` if the entity was never touched since construction.
    pub fn is_new(&self) -> bool {
        self.is_new.load(Ordering::Acquire)
    }

    /// Marks the entity as used now.
    pub fn touch(&self) {
        *self.last_used.lock() = Instant::now();
        self.is_new.store(false, Ordering::Release);
    }

    /// Returns when the entity was last touched.
    pub fn last_used(&self) -> Instant {
        *self.last_used.lock()
    }

    /// Returns the policy this entity is judged by.
    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }
}

/// A locally cached representation of a server-side resource.
///
/// Implementations call [`Entity::touch`] from every getter and at the end of
/// every successful [`Entity::update`]: the timestamp tracks the last use of
/// the entity, not the last time it was fetched.
#[async_trait]
pub trait Entity: Send + Sync + 'static {
    /// Key of the entity in its store.
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    /// Returns the key of this entity.
    fn key(&self) -> Self::Key;

    /// Returns the kind and key of this entity, as reported in errors.
    fn entity_key(&self) -> EntityKey;

    /// Returns the store holding entities of this kind.
    fn store(client: &WildFyreClient) -> &Store<Self::Key, Self>
    where
        Self: Sized;

    /// Returns the usage tracking of this entity.
    fn freshness(&self) -> &Freshness;

    /// Fetches the entity from the server and overwrites the local fields.
    ///
    /// Runs in the calling task. If the server says the entity doesn't exist,
    /// the entity evicts itself from its store and
    /// [`Error::EntityNotFound`] is returned.
    async fn update(&self, client: &WildFyreClient) -> Result<(), Error>;

    /// Puts this entity back under `key` after a background refresh.
    ///
    /// Entities that left their store for good override this to stay out.
    fn restore(self: Arc<Self>, client: &WildFyreClient, key: Self::Key)
    where
        Self: Sized,
    {
        Self::store(client).put(key, self);
    }

    /// Checks whether this entity is still fresh at `now`.
    ///
    /// Prefer this over [`Entity::is_valid`] when checking many entities.
    fn is_valid_at(&self, now: Instant) -> bool {
        self.freshness().is_valid_at(now)
    }

    /// Checks whether this entity is still fresh.
    fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    /// Returns `true` if this entity was never populated.
    fn is_new(&self) -> bool {
        self.freshness().is_new()
    }

    /// Marks this entity as used now.
    fn touch(&self) {
        self.freshness().touch()
    }
}
