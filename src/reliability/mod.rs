pub mod metrics;
pub mod retry;
pub mod watchdog;

#[cfg(feature = "metrics")]
pub use metrics::PrometheusStats;
pub use metrics::{MemoryStats, MetricsError, NopStats, Stats, Tags};
pub use retry::RetryPolicy;
pub use watchdog::track_long_running_transformation;
