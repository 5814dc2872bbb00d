//! Cache configuration

use std::time::Duration;

use crate::error::EntityKind;

/// Configuration for cache TTL (time-to-live) settings.
///
/// Controls how long each kind of entity is considered fresh. Stale entities
/// are still returned, but trigger a background refresh.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wildfyre_lib::cache::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_user_ttl(Duration::from_secs(600))
///     .with_post_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for users.
    ///
    /// Default: 30 minutes
    pub user_ttl: Duration,

    /// TTL for areas (reputation and spread).
    ///
    /// Default: 1 hour
    pub area_ttl: Duration,

    /// TTL for posts and their comments.
    ///
    /// Default: 10 minutes
    pub post_ttl: Duration,

    /// TTL for server-backed drafts.
    ///
    /// Default: 1 hour
    pub draft_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_ttl: Duration::from_secs(30 * 60),  // 30 minutes
            area_ttl: Duration::from_secs(60 * 60),  // 1 hour
            post_ttl: Duration::from_secs(10 * 60),  // 10 minutes
            draft_ttl: Duration::from_secs(60 * 60), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Creates a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user TTL.
    pub fn with_user_ttl(mut self, ttl: Duration) -> Self {
        self.user_ttl = ttl;
        self
    }

    /// Sets the area TTL.
    pub fn with_area_ttl(mut self, ttl: Duration) -> Self {
        self.area_ttl = ttl;
        self
    }

    /// Sets the post TTL.
    pub fn with_post_ttl(mut self, ttl: Duration) -> Self {
        self.post_ttl = ttl;
        self
    }

    /// Sets the draft TTL.
    pub fn with_draft_ttl(mut self, ttl: Duration) -> Self {
        self.draft_ttl = ttl;
        self
    }

    /// Creates a config where everything is stale immediately (zero TTLs).
    ///
    /// Entities are still fetched once and cached, but every later lookup
    /// schedules a background refresh.
    pub fn no_cache() -> Self {
        Self {
            user_ttl: Duration::ZERO,
            area_ttl: Duration::ZERO,
            post_ttl: Duration::ZERO,
            draft_ttl: Duration::ZERO,
        }
    }

    /// Returns the TTL configured for `kind`.
    pub fn ttl(&self, kind: EntityKind) -> Duration {
        match kind {
            EntityKind::User => self.user_ttl,
            EntityKind::Area => self.area_ttl,
            EntityKind::Post => self.post_ttl,
            EntityKind::Draft => self.draft_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl(EntityKind::User), Duration::from_secs(1800));
        assert_eq!(config.ttl(EntityKind::Area), Duration::from_secs(3600));
        assert_eq!(config.ttl(EntityKind::Post), Duration::from_secs(600));
        assert_eq!(config.ttl(EntityKind::Draft), Duration::from_secs(3600));
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::new()
            .with_user_ttl(Duration::from_millis(100))
            .with_draft_ttl(Duration::from_secs(5));
        assert_eq!(config.ttl(EntityKind::User), Duration::from_millis(100));
        assert_eq!(config.ttl(EntityKind::Draft), Duration::from_secs(5));
        assert_eq!(config.ttl(EntityKind::Post), Duration::from_secs(600));
    }
}
