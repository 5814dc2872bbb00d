//! Cached WildFyre entities
//!
//! Relations between entities are kept as keys and resolved through the
//! client caches when asked for, never as references to other entities.

mod area;
mod comment;
pub(crate) mod document;
mod draft;
mod post;
mod user;

pub use area::*;
pub use comment::*;
pub use draft::*;
pub use post::*;
pub use user::*;
