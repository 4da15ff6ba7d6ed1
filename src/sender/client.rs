//! Transport strategy abstraction.
//!
//! The transmitter only knows [`HttpTransport`]: send bytes to a URL, get back a
//! status, headers and body. Strategies differ in how they manage connections.

use crate::app::config::{ClientConfig, ClientType};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Failed to resolve {host}: {message}")]
    ResolveFailed { host: String, message: String },
    #[error("Network error: {0}")]
    NetworkError(reqwest::Error),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::NetworkError(err)
        }
    }
}

/// One POST to the transformation service.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Bytes,
}

impl TransportRequest {
    pub fn new(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single HTTP exchange.
///
/// Implementations must be safe to share between concurrently running batches.
/// Dropping the returned future aborts the request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

/// Base reqwest builder shared by every strategy.
pub(crate) fn client_builder(timeout: Duration, config: &ClientConfig) -> ClientBuilder {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.max_idle_connections_per_host)
        .user_agent(concat!("dest-transformer/", env!("CARGO_PKG_VERSION")))
}

pub(crate) fn build_client(builder: ClientBuilder) -> Result<Client, ClientError> {
    builder
        .build()
        .map_err(|e| ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}")))
}

/// Sends `request` through a concrete reqwest client.
pub(crate) async fn send_with(
    client: &Client,
    request: TransportRequest,
) -> Result<TransportResponse, ClientError> {
    let mut builder = client
        .post(&request.url)
        .header(CONTENT_TYPE, "application/json");
    for (name, value) in request.headers {
        builder = builder.header(name, value);
    }

    let response = builder.body(request.body).send().await?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(TransportResponse {
        status,
        headers,
        body,
    })
}

/// Builds the strategy selected by `config.client_type`.
pub fn build_transport(
    timeout: Duration,
    config: &ClientConfig,
) -> Result<Arc<dyn HttpTransport>, ClientError> {
    let transport: Arc<dyn HttpTransport> = match config.client_type {
        ClientType::Stdlib => Arc::new(super::pooled::PooledTransport::new(timeout, config)?),
        ClientType::Recycled => Arc::new(super::recycled::RecycledTransport::new(timeout, config)?),
        ClientType::Httplb => Arc::new(super::balanced::BalancedTransport::new(timeout, config)?),
    };
    Ok(transport)
}
