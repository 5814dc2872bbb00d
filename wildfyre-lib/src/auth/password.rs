//! Username and password authentication

use serde::Deserialize;
use serde_json::json;

use super::common::map_error_response;
use crate::error::AuthError;
use crate::error::Error;
use crate::model::document::decode;
use crate::transport::Method;
use crate::transport::Request;
use crate::transport::Transport;

/// A username and a password.
///
/// The password never shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn body(&self) -> serde_json::Value {
        json!({
            "username": self.username,
            "password": self.password,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Exchanges credentials for a token.
pub(crate) async fn request_token(transport: &dyn Transport, credentials: &Credentials) -> Result<String, Error> {
    let request = Request::new(Method::Post, "/account/auth/").json(credentials.body());
    let document = transport.request(request).await.map_err(map_error_response)?;

    let response: TokenResponse = decode("token", document)?;
    if response.token.is_empty() {
        return Err(AuthError::EmptyToken.into());
    }
    Ok(response.token)
}
