//! Transport error types

use serde_json::Value;

/// The detail message the server uses for missing entities.
pub const NOT_FOUND_DETAIL: &str = "Not found.";

/// The server could not be reached at all.
#[derive(Debug, thiserror::Error)]
#[error("Cannot connect to the server: {message}")]
pub struct ConnectivityError {
    message: String,
    #[source]
    source: Option<reqwest::Error>,
}

impl ConnectivityError {
    /// Creates a connectivity error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for ConnectivityError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// The server was reached but refused the request.
///
/// Carries the structured error body when the server sent one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("HTTP {status}: the server refused the request{}", body_suffix(.body))]
pub struct TransferError {
    /// HTTP status code.
    pub status: u16,
    /// The error document sent by the server, if any.
    pub body: Option<Value>,
}

fn body_suffix(body: &Option<Value>) -> String {
    match body {
        Some(body) => format!(" ({})", body),
        None => String::new(),
    }
}

impl TransferError {
    /// Creates a transfer error without a body.
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Creates a transfer error carrying the server's error document.
    pub fn with_body(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// Creates the error the server sends for a missing entity.
    pub fn not_found() -> Self {
        Self::with_body(404, serde_json::json!({ "detail": NOT_FOUND_DETAIL }))
    }

    /// Returns the `detail` message of the error body, if any.
    pub fn detail(&self) -> Option<&str> {
        self.body.as_ref()?.get("detail")?.as_str()
    }

    /// Returns `true` if the `detail` message of the error body is `detail`.
    pub fn has_detail(&self, detail: &str) -> bool {
        self.detail() == Some(detail)
    }

    /// Returns `true` if the server says the requested entity doesn't exist.
    pub fn is_not_found(&self) -> bool {
        self.has_detail(NOT_FOUND_DETAIL)
    }

    /// Returns `true` if `message` is one of the body's `non_field_errors`.
    pub fn has_non_field_error(&self, message: &str) -> bool {
        self.body
            .as_ref()
            .and_then(|body| body.get("non_field_errors"))
            .and_then(Value::as_array)
            .is_some_and(|errors| errors.iter().any(|e| e.as_str() == Some(message)))
    }
}

/// Failure of a single exchange with the server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// The server rejected the request.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The server accepted the request but its answer isn't a JSON document.
    #[error("Malformed answer to {context}: {source}")]
    Malformed {
        /// The request being answered.
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// Returns the transfer error if the server was reached.
    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            Self::Transfer(e) => Some(e),
            Self::Connectivity(_) | Self::Malformed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_detail_matching() {
        let err = TransferError::with_body(404, json!({ "detail": "Not found." }));
        assert!(err.is_not_found());
        assert!(err.has_detail("Not found."));
        assert!(!err.has_detail("Forbidden."));
    }

    #[test]
    fn test_detail_absent() {
        assert_eq!(TransferError::new(500).detail(), None);
        assert!(!TransferError::new(404).is_not_found());
        assert!(!TransferError::with_body(400, json!(["oops"])).is_not_found());
    }

    #[test]
    fn test_non_field_errors() {
        let err = TransferError::with_body(
            400,
            json!({ "non_field_errors": ["Unable to log in with provided credentials."] }),
        );
        assert!(err.has_non_field_error("Unable to log in with provided credentials."));
        assert!(!err.has_non_field_error("Something else."));
    }

    #[test]
    fn test_display_includes_body() {
        let err = TransferError::with_body(403, json!({ "detail": "Forbidden." }));
        let message = err.to_string();
        assert!(message.starts_with("HTTP 403"));
        assert!(message.contains("Forbidden."));
    }
}
