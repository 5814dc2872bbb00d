//! Identification of cached entities in errors

use std::fmt;

use crate::model::PostKey;

/// The kinds of entities held by the client cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Area,
    Post,
    Draft,
}

impl EntityKind {
    /// All kinds, in a stable order.
    pub const ALL: [EntityKind; 4] = [Self::User, Self::Area, Self::Post, Self::Draft];

    /// Returns the lowercase name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Area => "area",
            Self::Post => "post",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind and key of a cached entity.
///
/// Errors carry this instead of the entity itself, so that matching on the
/// variant replaces any downcasting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    User(u64),
    Area(String),
    Post(PostKey),
    Draft(PostKey),
}

impl EntityKey {
    /// Returns the kind of the entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Area(_) => EntityKind::Area,
            Self::Post(_) => EntityKind::Post,
            Self::Draft(_) => EntityKind::Draft,
        }
    }

    /// Returns the user ID if this is a user.
    pub fn as_user(&self) -> Option<u64> {
        match self {
            Self::User(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the area ID if this is an area.
    pub fn as_area(&self) -> Option<&str> {
        match self {
            Self::Area(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the post key if this is a post.
    pub fn as_post(&self) -> Option<&PostKey> {
        match self {
            Self::Post(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {}", id),
            Self::Area(id) => write!(f, "area '{}'", id),
            Self::Post(key) => write!(f, "post {}", key),
            Self::Draft(key) => write!(f, "draft {}", key),
        }
    }
}
