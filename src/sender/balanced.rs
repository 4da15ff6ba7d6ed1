use super::client::{
    ClientError, HttpTransport, TransportRequest, TransportResponse, build_client, client_builder,
    send_with,
};
use crate::app::config::ClientConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::lookup_host;
use tracing::{debug, warn};
use url::{Host, Url};

struct Backends {
    clients: Vec<Client>,
    resolved_at: Instant,
}

/// Strategy that spreads requests round-robin over every address a host resolves to.
///
/// Each address gets its own pinned client. Addresses are re-resolved every
/// `lb_refresh_interval`. IP literals are served by a single client.
pub struct BalancedTransport {
    timeout: Duration,
    config: ClientConfig,
    direct: Client,
    backends: Mutex<HashMap<String, Backends>>,
    next: AtomicUsize,
}

impl BalancedTransport {
    pub fn new(timeout: Duration, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            timeout,
            config: config.clone(),
            direct: build_client(client_builder(timeout, config))?,
            backends: Mutex::new(HashMap::new()),
            next: AtomicUsize::new(0),
        })
    }

    async fn pick(&self, raw_url: &str) -> Result<Client, ClientError> {
        let url = Url::parse(raw_url)
            .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid URL {raw_url}: {e}")))?;
        let (Some(Host::Domain(domain)), Some(port)) = (url.host(), url.port_or_known_default())
        else {
            return Ok(self.direct.clone());
        };
        let key = format!("{domain}:{port}");

        if let Some(client) = self.cached(&key, false) {
            return Ok(client);
        }

        match self.resolve(domain, port).await {
            Ok(clients) => {
                let client = self.round_robin(&clients);
                self.backends.lock().insert(
                    key,
                    Backends {
                        clients,
                        resolved_at: Instant::now(),
                    },
                );
                Ok(client)
            }
            Err(err) => match self.cached(&key, true) {
                Some(client) => {
                    warn!(host = %key, error = %err, "Re-resolution failed, keeping previous backends");
                    Ok(client)
                }
                None => Err(err),
            },
        }
    }

    fn cached(&self, key: &str, allow_stale: bool) -> Option<Client> {
        let backends = self.backends.lock();
        let entry = backends.get(key)?;
        if !allow_stale && entry.resolved_at.elapsed() >= self.config.lb_refresh_interval {
            return None;
        }
        Some(self.round_robin(&entry.clients))
    }

    fn round_robin(&self, clients: &[Client]) -> Client {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % clients.len();
        clients[index].clone()
    }

    async fn resolve(&self, domain: &str, port: u16) -> Result<Vec<Client>, ClientError> {
        let resolve_failed = |message: String| ClientError::ResolveFailed {
            host: domain.to_string(),
            message,
        };

        let mut addrs: Vec<SocketAddr> = lookup_host((domain, port))
            .await
            .map_err(|e| resolve_failed(e.to_string()))?
            .collect();
        addrs.sort();
        addrs.dedup();
        if addrs.is_empty() {
            return Err(resolve_failed("no addresses".to_string()));
        }
        debug!(host = domain, backends = addrs.len(), "Resolved transformer backends");

        addrs
            .into_iter()
            .map(|addr| build_client(client_builder(self.timeout, &self.config).resolve(domain, addr)))
            .collect()
    }

    #[cfg(test)]
    fn backend_count(&self, key: &str) -> usize {
        self.backends
            .lock()
            .get(key)
            .map(|entry| entry.clients.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl HttpTransport for BalancedTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ClientError> {
        let client = self.pick(&request.url).await?;
        send_with(&client, request).await
    }

    fn name(&self) -> &'static str {
        "httplb"
    }
}
