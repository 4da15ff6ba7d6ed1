use super::client::{
    ClientError, HttpTransport, TransportRequest, TransportResponse, build_client, client_builder,
    send_with,
};
use crate::app::config::ClientConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default strategy: one shared reqwest connection pool.
#[derive(Debug, Clone)]
pub struct PooledTransport {
    client: Client,
}

impl PooledTransport {
    pub fn new(timeout: Duration, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(client_builder(timeout, config))?,
        })
    }

    /// Wraps a caller-built client, keeping its own timeout and pool settings.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for PooledTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        send_with(&self.client, request).await
    }

    fn name(&self) -> &'static str {
        "stdlib"
    }
}
