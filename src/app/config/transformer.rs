use super::ConfigError;
use super::groups::{ClientConfig, RetryConfig, WarehouseConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings consumed by the destination transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Base URL of the transformation service.
    pub dest_transform_url: String,
    /// Per-request timeout.
    #[serde(with = "super::serde_helpers")]
    pub timeout: Duration,
    /// Events per request. Zero sends everything in one request.
    pub batch_size: usize,
    /// Batches in flight at once.
    pub max_concurrency: usize,
    pub fail_on_user_transform_timeout: bool,
    pub fail_on_error: bool,
    pub compaction_enabled: bool,
    #[serde(with = "super::serde_helpers")]
    pub long_running_threshold: Duration,
    pub retry: RetryConfig,
    pub client: ClientConfig,
    pub warehouse: WarehouseConfig,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            dest_transform_url: "http://localhost:9090".to_string(),
            timeout: Duration::from_secs(600),
            batch_size: 200,
            max_concurrency: 8,
            fail_on_user_transform_timeout: false,
            fail_on_error: false,
            compaction_enabled: false,
            long_running_threshold: Duration::from_secs(120),
            retry: RetryConfig::default(),
            client: ClientConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

impl TransformerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TransformerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
