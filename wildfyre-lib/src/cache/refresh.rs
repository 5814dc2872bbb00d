//! Refresh coordination
//!
//! Decides, for every lookup, whether the entity is fetched inline, refreshed
//! in the background or returned as-is, and routes failures of background
//! work to the registered handlers.

use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio_util::task::TaskTracker;

use super::Entity;
use crate::WildFyreClient;
use crate::error::ConnectivityError;
use crate::error::EntityKey;
use crate::error::Error;
use crate::error::TransportError;

/// Receives connectivity failures that have no caller to return to.
pub type ConnectivityErrorHandler = Box<dyn Fn(ConnectivityError) + Send + Sync>;

/// Receives missing entities discovered by background refreshes.
pub type EntityNotFoundHandler = Box<dyn Fn(EntityKey) + Send + Sync>;

/// Owns the background task pool and the error handlers.
pub(crate) struct Refresher {
    tasks: TaskTracker,
    shut_down: AtomicBool,
    on_connectivity: OnceLock<ConnectivityErrorHandler>,
    on_not_found: OnceLock<EntityNotFoundHandler>,
}

impl Refresher {
    pub fn new() -> Self {
        Self {
            tasks: TaskTracker::new(),
            shut_down: AtomicBool::new(false),
            on_connectivity: OnceLock::new(),
            on_not_found: OnceLock::new(),
        }
    }

    /// Installs the connectivity handler. Only the first registration counts.
    pub fn set_connectivity_error_handler(&self, handler: ConnectivityErrorHandler) -> bool {
        let installed = self.on_connectivity.set(handler).is_ok();
        if !installed {
            tracing::warn!("a connectivity error handler is already registered, ignoring the new one");
        }
        installed
    }

    /// Installs the entity-not-found handler. Only the first registration counts.
    pub fn set_entity_not_found_handler(&self, handler: EntityNotFoundHandler) -> bool {
        let installed = self.on_not_found.set(handler).is_ok();
        if !installed {
            tracing::warn!("an entity-not-found handler is already registered, ignoring the new one");
        }
        installed
    }

    /// Runs `task` on the shared background pool.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Number of background tasks still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Hands a connectivity failure of a lookup to the handler.
    ///
    /// Without a handler the failure is returned so the caller propagates it.
    pub fn report_connectivity(&self, err: ConnectivityError) -> Result<(), Error> {
        match self.on_connectivity.get() {
            Some(handler) => {
                handler(err);
                Ok(())
            }
            None => Err(Error::Connectivity(err)),
        }
    }

    /// Routes the failure of a background task.
    ///
    /// # Panics
    ///
    /// Panics (in the background task) when the matching handler was never
    /// registered, and on malformed documents.
    pub fn report(&self, err: Error) {
        match err {
            Error::Connectivity(err) => match self.on_connectivity.get() {
                Some(handler) => handler(err),
                None => {
                    tracing::error!(error = %err, "background task lost connectivity and no handler is registered");
                    panic!(
                        "no connectivity error handler registered; call WildFyreClient::set_connectivity_error_handler ({})",
                        err
                    );
                }
            },
            Error::EntityNotFound { key } => match self.on_not_found.get() {
                Some(handler) => handler(key),
                None => {
                    tracing::error!(%key, "background task found a missing entity and no handler is registered");
                    panic!(
                        "no entity-not-found handler registered; call WildFyreClient::set_entity_not_found_handler ({} is missing)",
                        key
                    );
                }
            },
            err @ Error::MalformedDocument { .. } => {
                tracing::error!(error = %err, "the server sent an unexpected document");
                panic!("client and server disagree on the API: {}", err);
            }
            err => tracing::error!(error = %err, "background task failed"),
        }
    }

    /// Waits until every background task spawned so far has finished.
    ///
    /// The pool is left closed if [`Refresher::shutdown`] ran meanwhile.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        if !self.shut_down.load(Ordering::Acquire) {
            self.tasks.reopen();
        }
    }

    /// Waits for the background tasks, leaving the pool closed.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.tasks.close();
        self.tasks.wait().await;
    }
}

/// Resolves `key` through the store of `E`.
///
/// - absent or never populated: fetched in the calling task before anything is returned;
/// - stale: returned immediately, a background refresh is scheduled;
/// - fresh: returned immediately.
///
/// `Ok(None)` means the entity doesn't exist server-side, or the server could
/// not be reached and the connectivity handler was notified; in the latter
/// case the placeholder stays cached and is fetched again on the next lookup.
pub(crate) async fn lookup<E: Entity>(
    client: &WildFyreClient,
    key: E::Key,
    create: impl FnOnce() -> E,
) -> Result<Option<Arc<E>>, Error> {
    let store = E::store(client);
    let entity = store.get_or_create(key.clone(), create);

    if entity.is_new() {
        tracing::debug!(?key, "cache miss, fetching");
        match entity.update(client).await {
            Ok(()) => {}
            Err(Error::EntityNotFound { key: missing }) => {
                store.remove_entity(&key, &entity);
                tracing::debug!(%missing, "entity does not exist server-side");
                return Ok(None);
            }
            Err(Error::Connectivity(err)) => {
                client.refresher().report_connectivity(err)?;
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
    } else if !entity.is_valid() {
        tracing::debug!(?key, "stale entity, refreshing in the background");
        schedule_refresh(client, Arc::clone(&entity));
    }

    entity.touch();
    Ok(Some(entity))
}

/// Refreshes `entity` in the background.
///
/// On success the entity is restored under the key it had when the refresh
/// was scheduled, even if it was evicted while the refresh was in flight.
/// Nothing is restored once the session changed.
pub(crate) fn schedule_refresh<E: Entity>(client: &WildFyreClient, entity: Arc<E>) {
    let task_client = client.clone();
    let key = entity.key();
    let generation = client.session_generation();
    client.refresher().spawn(async move {
        match entity.update(&task_client).await {
            Ok(()) => {
                let restored = task_client.within_session(generation, || entity.restore(&task_client, key.clone()));
                if !restored {
                    tracing::debug!(?key, "session changed during the refresh, dropping the result");
                }
            }
            Err(err) => task_client.refresher().report(err),
        }
    });
}

/// Converts a failed exchange about `entity` into an [`Error`].
///
/// When the server says the entity doesn't exist, it is evicted from its
/// store and [`Error::EntityNotFound`] is returned.
pub(crate) fn evict_if_missing<E: Entity>(client: &WildFyreClient, entity: &E, err: TransportError) -> Error {
    match err {
        TransportError::Transfer(err) if err.is_not_found() => {
            E::store(client).remove_entity(&entity.key(), entity);
            tracing::debug!(key = %entity.entity_key(), "evicted entity missing server-side");
            Error::not_found(entity.entity_key())
        }
        err => err.into(),
    }
}

/// Runs `task` in the background, routing its failure to the handlers.
pub(crate) fn spawn_reporting<F>(client: &WildFyreClient, task: F)
where
    F: Future<Output = Result<(), Error>> + Send + 'static,
{
    let task_client = client.clone();
    client.refresher().spawn(async move {
        if let Err(err) = task.await {
            task_client.refresher().report(err);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_handler_registered_once() {
        let refresher = Refresher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        assert!(refresher.set_entity_not_found_handler(Box::new(move |key| first.lock().unwrap().push(("first", key)))));
        let second = Arc::clone(&seen);
        assert!(!refresher.set_entity_not_found_handler(Box::new(move |key| second.lock().unwrap().push(("second", key)))));

        refresher.report(Error::not_found(EntityKey::User(7)));
        assert_eq!(*seen.lock().unwrap(), vec![("first", EntityKey::User(7))]);
    }

    #[test]
    fn test_foreground_connectivity_without_handler_propagates() {
        let refresher = Refresher::new();
        let result = refresher.report_connectivity(ConnectivityError::new("offline"));
        assert!(matches!(result, Err(Error::Connectivity(_))));
    }

    #[test]
    fn test_foreground_connectivity_with_handler() {
        let refresher = Refresher::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        refresher.set_connectivity_error_handler(Box::new(move |_| *counter.lock().unwrap() += 1));

        assert!(refresher.report_connectivity(ConnectivityError::new("offline")).is_ok());
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "no connectivity error handler registered")]
    fn test_background_connectivity_without_handler_panics() {
        Refresher::new().report(Error::Connectivity(ConnectivityError::new("offline")));
    }

    #[test]
    #[should_panic(expected = "no entity-not-found handler registered")]
    fn test_background_not_found_without_handler_panics() {
        Refresher::new().report(Error::not_found(EntityKey::Area("fun".into())));
    }

    #[test]
    fn test_other_background_errors_are_logged() {
        Refresher::new().report(Error::InvalidArgument("nothing to send".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_reopens_the_pool() {
        let refresher = Refresher::new();
        refresher.spawn(tokio::time::sleep(std::time::Duration::from_millis(10)));

        refresher.wait_idle().await;
        assert_eq!(refresher.pending(), 0);
        assert!(!refresher.tasks.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_during_shutdown_keeps_the_pool_closed() {
        let refresher = Refresher::new();
        refresher.spawn(tokio::time::sleep(std::time::Duration::from_millis(10)));

        tokio::join!(refresher.wait_idle(), refresher.shutdown());
        assert!(refresher.tasks.is_closed());

        refresher.wait_idle().await;
        assert!(refresher.tasks.is_closed());
    }
}
