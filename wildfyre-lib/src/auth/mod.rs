//! Authentication
//!
//! Obtaining a token from a username and a password, and resolving the
//! identity a token belongs to. Sessions are managed by
//! [`WildFyreClient::connect`](crate::WildFyreClient::connect).

pub(crate) mod common;
mod password;

pub use password::Credentials;
pub(crate) use password::request_token;
