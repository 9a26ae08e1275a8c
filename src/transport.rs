//! The network seam beneath the dispatcher.
//!
//! A [`Connector`] builds the session lazily, a [`Transport`] performs one
//! exchange per call. Both are traits so the dispatcher can be driven by
//! in-memory doubles.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Url, header};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::client::InitError;
use crate::config::BankIdConfig;
use crate::domain::models::Operation;
use crate::tls::ClientCredentials;

/// Network-level failure below the protocol layer.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Http { url: Url, source: reqwest::Error },

    #[error("response from {url} exceeds {limit} bytes")]
    BodyTooLarge { url: Url, limit: usize },

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Upper bound on a response body. Completion data, the largest body the
/// endpoint sends, stays well below this.
pub const MAX_BODY_LEN: usize = 1024 * 1024;

/// Status and body of an answered request, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An established session able to exchange JSON bodies with the endpoint.
///
/// Implementations must be safe for concurrent use: a single instance serves
/// every call of a client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts `body` to the endpoint of `operation`. Performs exactly one attempt.
    async fn post(&self, operation: Operation, body: Vec<u8>) -> Result<RawResponse, TransportError>;
}

/// Builds the session on first use.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Transport>, InitError>;
}

/// Mutual TLS session over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    body_limit: usize,
}

impl HttpTransport {
    pub fn new(client: Client, base: Url) -> Self {
        Self {
            client,
            base,
            body_limit: MAX_BODY_LEN,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    fn url(&self, operation: Operation) -> Url {
        let mut url = self.base.clone();
        // The base always parses as a hierarchical URL, see `parse_base`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(operation.path());
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(url = tracing::field::Empty))]
    async fn post(&self, operation: Operation, body: Vec<u8>) -> Result<RawResponse, TransportError> {
        let url = self.url(operation);
        tracing::Span::current().record("url", tracing::field::display(&url));

        let response = self
            .client
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = read_body(response, url, self.body_limit).await?;

        debug!(status, len = body.len(), "Received response");
        Ok(RawResponse::new(status, body))
    }
}

async fn read_body(
    mut response: reqwest::Response,
    url: Url,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(TransportError::BodyTooLarge { url, limit });
    }

    let mut body = Vec::new();
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Ok(body),
            Err(source) => return Err(TransportError::Http { url, source }),
        };
        if body.len() + chunk.len() > limit {
            return Err(TransportError::BodyTooLarge { url, limit });
        }
        body.extend_from_slice(&chunk);
    }
}

/// Connector reading credential material from the configured files.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    config: Arc<BankIdConfig>,
}

impl TlsConnector {
    pub fn new(config: Arc<BankIdConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TlsConnector {
    #[instrument(skip(self))]
    async fn connect(&self) -> Result<Arc<dyn Transport>, InitError> {
        let base = parse_base(self.config.endpoint())?;
        let credentials = ClientCredentials::load(&self.config.credentials).await?;
        let client = credentials.build_client()?;

        debug!(endpoint = %base, "Transport session established");
        Ok(Arc::new(HttpTransport::new(client, base)))
    }
}

fn parse_base(endpoint: &str) -> Result<Url, InitError> {
    let invalid = |reason: String| InitError::Endpoint {
        url: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(invalid("only https endpoints are supported".into()));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base address".into()));
    }
    Ok(url)
}
