use super::client::{
    ClientError, HttpTransport, TransportRequest, TransportResponse, build_client, client_builder,
    send_with,
};
use crate::app::config::ClientConfig;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use tracing::debug;

/// Strategy that replaces its whole connection pool every `recycle_ttl`.
///
/// Requests already running on the old pool finish on it; the pool is dropped
/// once the last of them completes.
#[derive(Debug)]
pub struct RecycledTransport {
    timeout: Duration,
    config: ClientConfig,
    ttl: Duration,
    current: RwLock<(Client, Instant)>,
}

impl RecycledTransport {
    pub fn new(timeout: Duration, config: &ClientConfig) -> Result<Self, ClientError> {
        let client = build_client(Self::builder(timeout, config))?;

        Ok(Self {
            timeout,
            config: config.clone(),
            ttl: config.recycle_ttl,
            current: RwLock::new((client, Instant::now())),
        })
    }

    fn builder(timeout: Duration, config: &ClientConfig) -> ClientBuilder {
        client_builder(timeout, config).pool_idle_timeout(config.recycle_ttl)
    }

    fn client(&self) -> Result<Client, ClientError> {
        {
            let current = self.current.read();
            if current.1.elapsed() < self.ttl {
                return Ok(current.0.clone());
            }
        }

        let mut current = self.current.write();
        // another task may have recycled while we waited for the lock
        if current.1.elapsed() >= self.ttl {
            debug!(ttl = ?self.ttl, "Recycling transformer HTTP client");
            *current = (
                build_client(Self::builder(self.timeout, &self.config))?,
                Instant::now(),
            );
        }
        Ok(current.0.clone())
    }
}

#[async_trait]
impl HttpTransport for RecycledTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let client = self.client()?;
        send_with(&client, request).await
    }

    fn name(&self) -> &'static str {
        "recycled"
    }
}
