//! Authentication state of a client

/// The token and the identity of the logged-in user.
///
/// The client clears every cache whenever either changes, so that data
/// fetched on behalf of one user never leaks to another.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user_id: Option<u64>,
}

impl Session {
    /// A session for `token`, whose user is not resolved yet.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            user_id: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The ID of the logged-in user, once resolved.
    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    /// A session is connected as soon as it holds a token.
    pub fn is_connected(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn set_user_id(&mut self, user_id: Option<u64>) {
        self.user_id = user_id;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        let session = Session::default();
        assert!(!session.is_connected());
        assert!(session.token().is_none());
        assert!(session.user_id().is_none());
    }

    #[test]
    fn test_token_is_redacted() {
        let mut session = Session::with_token("secret-token");
        session.set_user_id(Some(3));
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("user_id: Some(3)"));
        assert!(session.is_connected());
    }
}
