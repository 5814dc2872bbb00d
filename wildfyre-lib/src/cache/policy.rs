//! Per-kind expiration policy

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How long cached entities of one kind stay fresh.
///
/// One policy is shared by every entity of a kind and is consulted each time
/// validity is checked, so changing the TTL affects already cached entities
/// immediately.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wildfyre_lib::cache::ExpirationPolicy;
///
/// let policy = ExpirationPolicy::new(Duration::from_secs(60));
/// policy.set_ttl(Duration::from_millis(100));
/// assert_eq!(policy.ttl(), Duration::from_millis(100));
/// ```
#[derive(Debug)]
pub struct ExpirationPolicy {
    ttl_millis: AtomicU64,
}

impl ExpirationPolicy {
    /// Creates a policy with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        warn_if_zero(ttl);
        Self {
            ttl_millis: AtomicU64::new(as_millis(ttl)),
        }
    }

    /// Returns the current TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.load(Ordering::Relaxed))
    }

    /// Changes the TTL.
    ///
    /// A zero TTL is accepted, but makes every entity stale as soon as it is
    /// cached.
    pub fn set_ttl(&self, ttl: Duration) {
        warn_if_zero(ttl);
        self.ttl_millis.store(as_millis(ttl), Ordering::Relaxed);
    }
}

fn as_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

fn warn_if_zero(ttl: Duration) {
    if ttl.is_zero() {
        tracing::warn!("expiration TTL set to zero, cached entities are always stale");
    }
}
