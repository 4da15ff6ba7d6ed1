use super::groups::{ClientConfig, RetryConfig, WarehouseConfig};
use super::{ClientType, ConfigError, LogFormat, LogLevel, TransformerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// File holding a JSON array of events (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Transformation service base URL
    #[arg(long, env = "DEST_TRANSFORM_URL", default_value = "http://localhost:9090")]
    pub dest_transform_url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "TRANSFORMER_TIMEOUT_MS", default_value = "600000")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[arg(long, env = "TRANSFORMER_MAX_RETRY", default_value = "30")]
    pub max_retry: u32,

    /// Initial retry backoff in milliseconds
    #[arg(long, env = "TRANSFORMER_MIN_RETRY_BACKOFF_MS", default_value = "500")]
    pub min_backoff_ms: u64,

    /// Maximum retry backoff in milliseconds
    #[arg(long, env = "TRANSFORMER_MAX_RETRY_BACKOFF_MS", default_value = "30000")]
    pub max_backoff_ms: u64,

    /// Randomize retry backoff
    #[arg(long, env = "TRANSFORMER_RETRY_JITTER")]
    pub retry_jitter: bool,

    /// Events per request (0 sends everything at once)
    #[arg(long, env = "TRANSFORM_BATCH_SIZE", default_value = "200")]
    pub batch_size: usize,

    /// Requests in flight at once
    #[arg(long, env = "TRANSFORMER_MAX_CONCURRENCY", default_value = "8")]
    pub max_concurrency: usize,

    /// Turn timed out batches into failed events instead of aborting
    #[arg(long, env = "TRANSFORMER_FAIL_ON_USER_TRANSFORM_TIMEOUT")]
    pub fail_on_user_transform_timeout: bool,

    /// Turn failed batches into failed events instead of aborting
    #[arg(long, env = "TRANSFORMER_FAIL_ON_ERROR")]
    pub fail_on_error: bool,

    /// Send requests in the compacted format
    #[arg(long, env = "TRANSFORMER_COMPACTION_ENABLED")]
    pub compaction_enabled: bool,

    /// Warn about requests running longer than this many milliseconds
    #[arg(long, env = "TRANSFORMER_LONG_RUNNING_THRESHOLD_MS", default_value = "120000")]
    pub long_running_threshold_ms: u64,

    /// HTTP client strategy
    #[arg(long, env = "TRANSFORMER_CLIENT_TYPE", default_value = "stdlib")]
    pub client_type: ClientType,

    /// Idle connections kept per host
    #[arg(long, env = "TRANSFORMER_MAX_IDLE_CONNS_PER_HOST", default_value = "64")]
    pub max_idle_connections_per_host: usize,

    /// Connect timeout in milliseconds
    #[arg(long, env = "TRANSFORMER_CONNECT_TIMEOUT_MS", default_value = "10000")]
    pub connect_timeout_ms: u64,

    /// Pool lifetime of the recycled client in milliseconds
    #[arg(long, env = "TRANSFORMER_RECYCLE_TTL_MS", default_value = "60000")]
    pub recycle_ttl_ms: u64,

    /// Backend re-resolution interval of the load-balanced client in milliseconds
    #[arg(long, env = "TRANSFORMER_LB_REFRESH_INTERVAL_MS", default_value = "30000")]
    pub lb_refresh_interval_ms: u64,

    /// Add warehouse query parameters to warehouse destination URLs
    #[arg(long, env = "ENABLE_WAREHOUSE_TRANSFORMATIONS")]
    pub enable_warehouse_transformations: bool,

    /// Ask the service to resolve warehouse ids
    #[arg(long, env = "WAREHOUSE_ENABLE_ID_RESOLUTION")]
    pub enable_id_resolution: bool,

    /// Enable array support for ClickHouse
    #[arg(long, env = "CLICKHOUSE_ENABLE_ARRAY_SUPPORT")]
    pub clickhouse_enable_array_support: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "compact")]
    pub log_format: LogFormat,

    /// TOML file with transformer settings; replaces the flags above
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Print collected metrics to stderr when done
    #[arg(long)]
    pub dump_metrics: bool,

    /// Derived settings (not CLI arguments)
    #[arg(skip)]
    pub transformer: TransformerConfig,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        config.post_process()?;
        Ok(config)
    }

    /// Builds [`TransformerConfig`] from the flags, or from `config_file` when set.
    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.transformer = match &self.config_file {
            Some(path) => TransformerConfig::from_file(path)?,
            None => self.flags_to_transformer_config(),
        };
        self.transformer.validate()
    }

    fn flags_to_transformer_config(&self) -> TransformerConfig {
        TransformerConfig {
            dest_transform_url: self.dest_transform_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
            fail_on_user_transform_timeout: self.fail_on_user_transform_timeout,
            fail_on_error: self.fail_on_error,
            compaction_enabled: self.compaction_enabled,
            long_running_threshold: Duration::from_millis(self.long_running_threshold_ms),
            retry: RetryConfig {
                max_retry: self.max_retry,
                min_backoff: Duration::from_millis(self.min_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                jitter: self.retry_jitter,
            },
            client: ClientConfig {
                client_type: self.client_type,
                max_idle_connections_per_host: self.max_idle_connections_per_host,
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                recycle_ttl: Duration::from_millis(self.recycle_ttl_ms),
                lb_refresh_interval: Duration::from_millis(self.lb_refresh_interval_ms),
            },
            warehouse: WarehouseConfig {
                enable_warehouse_transformations: self.enable_warehouse_transformations,
                enable_id_resolution: self.enable_id_resolution,
                clickhouse_enable_array_support: self.clickhouse_enable_array_support,
            },
        }
    }
}
