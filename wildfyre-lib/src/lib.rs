//! WildFyre API client library
//!
//! A Rust async client library for the WildFyre social network. Remote
//! entities (users, areas, posts, drafts) are cached per kind; a cached entity
//! past its TTL is still returned immediately while it is refreshed in the
//! background, and an entity never seen before is fetched before the lookup
//! returns.

pub mod auth;
pub mod cache;
pub mod error;
pub mod model;
pub mod session;
pub mod transport;

mod client;

pub use client::*;
