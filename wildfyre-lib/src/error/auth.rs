//! Authentication error types

/// Errors that can occur while obtaining a session.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Invalid username or password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The token is empty.
    #[error("The token should not be empty")]
    EmptyToken,
}
