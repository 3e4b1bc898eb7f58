//! HTTP client seam used by the poll loop.
//!
//! The loop only needs "send this request, give me a buffered response or a
//! classified transport error". [`ReqwestClient`] is the default
//! implementation; tests and embedders can supply their own.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{BuildError, TransportError};
use crate::request::{Auth, RequestSpec};
use crate::response::Response;

/// Per-request options passed through to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// `Some(false)` disables TLS certificate verification for this request.
    pub verify: Option<bool>,
}

/// Dispatches a request and buffers the response.
///
/// Implementations must be safe to share between sessions running concurrently.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        request: &RequestSpec,
        options: &SendOptions,
    ) -> Result<Response, TransportError>;
}

/// Default per-request timeout of [`ReqwestClient`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpClient`] backed by `reqwest`.
///
/// A second client that skips certificate verification is created on first
/// use of `verify: Some(false)`.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::Client,
    insecure: OnceLock<reqwest::Client>,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, BuildError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, BuildError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BuildError::Client(e.to_string()))?;
        Ok(Self {
            client,
            insecure: OnceLock::new(),
            timeout,
        })
    }

    /// Wrap an existing `reqwest::Client`, keeping its connection pool and defaults.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            insecure: OnceLock::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn client_for(&self, options: &SendOptions) -> Result<&reqwest::Client, TransportError> {
        if options.verify != Some(false) {
            return Ok(&self.client);
        }
        if let Some(client) = self.insecure.get() {
            return Ok(client);
        }
        warn!("TLS certificate verification DISABLED for polled endpoint");
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(self.insecure.get_or_init(|| client))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(
        &self,
        request: &RequestSpec,
        options: &SendOptions,
    ) -> Result<Response, TransportError> {
        let client = self.client_for(options)?;
        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        builder = match &request.auth {
            Some(Auth::Basic { username, password }) => {
                builder.basic_auth(username, password.as_ref())
            }
            Some(Auth::Bearer { token }) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Response::new(status, body)
            .with_headers(headers)
            .with_url(url))
    }
}
