//! HTTP transport backed by reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header;
use url::Url;

use super::Document;
use super::Method;
use super::Request;
use super::Transport;
use crate::error::ConnectivityError;
use crate::error::Error;
use crate::error::TransferError;
use crate::error::TransportError;

/// The public WildFyre API.
pub const DEFAULT_URL: &str = "https://api.wildfyre.net";

/// A [`Transport`] that talks JSON over HTTP.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wildfyre_lib::transport::HttpTransport;
///
/// let transport = HttpTransport::new("http://localhost:8000")
///     .unwrap()
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(transport.base_url().as_str(), "http://localhost:8000/");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http_client: Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport for the server at `url`.
    pub fn new(url: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self::with_client(parse_base_url(url.as_ref())?, Client::new()))
    }

    /// Creates a transport for the server at `base_url` using an existing HTTP client.
    pub fn with_client(base_url: Url, http_client: Client) -> Self {
        Self {
            base_url,
            http_client,
            timeout: None,
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the root URL of the server.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url, ConnectivityError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConnectivityError::new(format!("invalid path '{}': {}", path, e)))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_client(Url::parse(DEFAULT_URL).expect("default URL is valid"), Client::new())
    }
}

pub(crate) fn parse_base_url(url: &str) -> Result<Url, Error> {
    let mut url = Url::parse(url).map_err(|e| Error::InvalidArgument(format!("invalid URL '{}': {}", url, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: Request) -> Result<Document, TransportError> {
        let url = self.url_for(&request.path)?;
        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder = self
            .http_client
            .request(to_reqwest(request.method), url)
            .header(header::ACCEPT, "application/json")
            .header(header::FROM, "lib-rust");

        if let Some(token) = &request.token {
            builder = builder.header(header::AUTHORIZATION, format!("token {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(ConnectivityError::from)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ConnectivityError::from)?;
        tracing::debug!(method = %request.method, path = %request.path, status = status.as_u16(), "received response");

        if status.is_success() {
            parse_success(&bytes, || format!("{} {}", request.method, request.path))
        } else {
            let body = serde_json::from_slice(&bytes).ok();
            Err(TransferError {
                status: status.as_u16(),
                body,
            }
            .into())
        }
    }
}

/// Parses the body of a 2xx answer. An empty body is `null`.
fn parse_success(bytes: &[u8], context: impl FnOnce() -> String) -> Result<Document, TransportError> {
    if bytes.is_empty() {
        return Ok(Document::Null);
    }
    serde_json::from_slice(bytes).map_err(|source| TransportError::Malformed {
        context: context(),
        source,
    })
}
