pub mod config;
pub mod logging_system;

pub use config::{Config, ConfigError, LogFormat, LogLevel};
pub use logging_system::{LoggingSystem, setup_logging};

use crate::domain::{Response, TransformerEvent};
use crate::reliability::metrics::Stats;
use crate::transformer::DestinationTransformer;
use anyhow::{Context, Result};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[cfg(feature = "metrics")]
type AppStats = crate::reliability::metrics::PrometheusStats;
#[cfg(not(feature = "metrics"))]
type AppStats = crate::reliability::metrics::MemoryStats;

/// One transform run: read events, call the service, print the response.
pub struct App {
    config: Config,
    transformer: DestinationTransformer,
    stats: Arc<AppStats>,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let stats = Arc::new(AppStats::default());
        let transformer = DestinationTransformer::builder(config.transformer.clone())
            .stats(Arc::clone(&stats) as Arc<dyn Stats>)
            .build()
            .context("failed to build destination transformer")?;

        Ok(Self {
            config,
            transformer,
            stats,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transforms the configured input, cancelling on Ctrl+C.
    pub async fn run(&self) -> Result<Response> {
        let events = read_events(self.config.input.as_deref()).await?;
        info!(
            events = events.len(),
            url = %self.config.transformer.dest_transform_url,
            client = self.transformer.transport_name(),
            "Starting destination transformation"
        );

        let cancel = CancellationToken::new();
        let transform = self.transformer.transform(&cancel, events);
        tokio::pin!(transform);

        let response = tokio::select! {
            result = &mut transform => result?,
            () = wait_for_interrupt(tokio::signal::ctrl_c()) => {
                warn!("Interrupt received, cancelling in-flight requests");
                cancel.cancel();
                transform.await?
            }
        };
        Ok(response)
    }

    #[cfg(feature = "metrics")]
    fn export_metrics(&self) -> Result<String> {
        Ok(self.stats.export()?)
    }

    #[cfg(not(feature = "metrics"))]
    fn export_metrics(&self) -> Result<String> {
        let lines: Vec<String> = self
            .stats
            .all()
            .into_iter()
            .map(|m| format!("{m:?}"))
            .collect();
        Ok(lines.join("\n"))
    }
}

/// Resolves once `signal` reports an interrupt.
///
/// If the handler cannot be installed the run continues uncancellable.
async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Reads a JSON array of events from `path`, or from stdin when `None`.
pub async fn read_events(path: Option<&Path>) -> Result<Vec<TransformerEvent>> {
    let raw = match path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("failed to read stdin")?;
            buffer
        }
    };
    serde_json::from_slice(&raw).context("input is not a JSON array of transformer events")
}

async fn write_response(response: &Response) -> Result<()> {
    let mut body = serde_json::to_vec_pretty(response)?;
    body.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&body).await?;
    stdout.flush().await?;
    Ok(())
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub async fn main() -> Result<()> {
    let config = match Config::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = setup_logging(config.log_level, config.log_format) {
        eprintln!("Failed to initialize logging: {e}");
    }
    info!("Starting dest-transformer v{}", get_version());

    let dump_metrics = config.dump_metrics;
    let app = App::from_config(config)?;

    let outcome = app.run().await;
    if dump_metrics {
        match app.export_metrics() {
            Ok(text) => eprintln!("{text}"),
            Err(e) => warn!(error = %e, "Failed to export metrics"),
        }
    }

    match outcome {
        Ok(response) => write_response(&response).await,
        Err(e) => {
            error!("Transformation failed: {e:#}");
            process::exit(1);
        }
    }
}
