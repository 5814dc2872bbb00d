//! Shared authentication utilities

use crate::error::AuthError;
use crate::error::Error;
use crate::error::TransportError;
use crate::model::document::UserDocument;
use crate::model::document::decode;
use crate::transport::Request;
use crate::transport::Transport;

/// What the server answers in `non_field_errors` when the credentials are wrong.
pub(crate) const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Maps a failed authentication exchange to an [`Error`].
pub(crate) fn map_error_response(err: TransportError) -> Error {
    match err {
        TransportError::Transfer(e) if e.has_non_field_error(INVALID_CREDENTIALS) => AuthError::InvalidCredentials.into(),
        err => err.into(),
    }
}

/// Returns the ID of the user `token` belongs to.
pub(crate) async fn fetch_identity(transport: &dyn Transport, token: &str) -> Result<u64, Error> {
    let request = Request::get("/users/").token(Some(token.to_string()));
    let document = transport.request(request).await?;
    let identity: UserDocument = decode("identity", document)?;
    Ok(identity.user)
}
