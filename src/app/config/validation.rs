use super::{ConfigError, TransformerConfig};
use std::time::Duration;
use url::Url;

impl TransformerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.dest_transform_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid transformer URL '{}': {}",
                self.dest_transform_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Transformer URL must use http or https: {}",
                self.dest_transform_url
            )));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max concurrency must be greater than 0".to_string(),
            ));
        }

        if self.long_running_threshold.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Long running threshold must be greater than 0".to_string(),
            ));
        }

        if self.retry.min_backoff > self.retry.max_backoff {
            return Err(ConfigError::InvalidConfig(format!(
                "Min backoff ({:?}) must not exceed max backoff ({:?})",
                self.retry.min_backoff, self.retry.max_backoff
            )));
        }

        if self.client.lb_refresh_interval == Duration::ZERO {
            return Err(ConfigError::InvalidConfig(
                "Load balancer refresh interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
