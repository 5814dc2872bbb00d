//! Exchanges with the WildFyre server
//!
//! The client never talks HTTP directly: every exchange goes through a
//! [`Transport`]. [`HttpTransport`] is the default implementation; tests and
//! embedders can supply their own.

mod http;

pub use http::*;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// A structured document exchanged with the server.
pub type Document = Value;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the server.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use wildfyre_lib::transport::{Method, Request};
///
/// let request = Request::new(Method::Post, "/account/auth/")
///     .json(json!({ "username": "user", "password": "password" }));
/// assert_eq!(request.path, "/account/auth/");
/// assert!(request.token.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,
    /// The path relative to the server root, e.g. `/users/42/`.
    pub path: String,
    /// The authentication token, if the request is authenticated.
    pub token: Option<String>,
    /// The JSON body, if any.
    pub body: Option<Document>,
}

impl Request {
    /// Creates an unauthenticated request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            token: None,
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Authenticates the request with `token`.
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Attaches a JSON body.
    pub fn json(mut self, body: Document) -> Self {
        self.body = Some(body);
        self
    }
}

/// Performs exchanges with the server.
///
/// Implementations return the response document on success. An empty
/// response body is returned as [`Document::Null`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the response.
    async fn request(&self, request: Request) -> Result<Document, TransportError>;
}
