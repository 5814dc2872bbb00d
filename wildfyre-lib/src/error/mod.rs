//! Error types

mod auth;
mod entity;
mod transport;

pub use auth::*;
pub use entity::*;
pub use transport::*;

/// Errors returned by the WildFyre client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server could not be reached.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// The server was reached but rejected the request.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The server reports that the entity does not exist (anymore).
    ///
    /// The stale local entry has already been evicted when this is returned.
    #[error("{key} does not exist server-side")]
    EntityNotFound {
        /// Which entity is missing.
        key: EntityKey,
    },

    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The server answered with a document that doesn't have the expected shape.
    ///
    /// This means the client and the server disagree on the API, it is never retried.
    #[error("malformed document for {context}: {source}")]
    MalformedDocument {
        /// What was being decoded.
        context: String,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// The operation requires a logged-in user.
    #[error("not connected; call connect first")]
    NotConnected,

    /// An argument was rejected before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The draft was already published or deleted.
    #[error("draft is {state} and cannot be modified")]
    DraftClosed {
        /// The terminal state of the draft.
        state: &'static str,
    },
}

impl Error {
    /// Creates an entity-not-found error.
    pub fn not_found(key: EntityKey) -> Self {
        Self::EntityNotFound { key }
    }

    /// Creates a malformed-document error.
    pub fn malformed(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedDocument {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` if this is a connectivity failure.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Returns the missing entity if this is an entity-not-found error.
    pub fn missing_entity(&self) -> Option<&EntityKey> {
        match self {
            Self::EntityNotFound { key } => Some(key),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connectivity(e) => Self::Connectivity(e),
            TransportError::Transfer(e) => Self::Transfer(e),
            TransportError::Malformed { context, source } => Self::MalformedDocument { context, source },
        }
    }
}
