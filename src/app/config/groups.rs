use super::ClientType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retry: u32,
    #[serde(with = "super::serde_helpers")]
    pub min_backoff: Duration,
    #[serde(with = "super::serde_helpers")]
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry: 30,
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            jitter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_type: ClientType,
    pub max_idle_connections_per_host: usize,
    #[serde(with = "super::serde_helpers")]
    pub connect_timeout: Duration,
    /// Lifetime of a pool before the recycled client replaces it.
    #[serde(with = "super::serde_helpers")]
    pub recycle_ttl: Duration,
    /// How often the load-balanced client re-resolves backends.
    #[serde(with = "super::serde_helpers")]
    pub lb_refresh_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_type: ClientType::Stdlib,
            max_idle_connections_per_host: 64,
            connect_timeout: Duration::from_secs(10),
            recycle_ttl: Duration::from_secs(60),
            lb_refresh_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub enable_warehouse_transformations: bool,
    pub enable_id_resolution: bool,
    pub clickhouse_enable_array_support: bool,
}
