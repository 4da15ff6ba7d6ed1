//! Destination transformation calls.
//!
//! [`DestinationTransformer::transform`] splits events into batches, sends the
//! batches concurrently through a bounded worker pool and merges the
//! partitioned replies into one [`Response`].

pub mod partition;

pub use partition::{merge, partition};

use crate::app::config::{ConfigError, TransformerConfig};
use crate::buffer::split_into_batches;
use crate::domain::{Response, TransformerError, TransformerEvent};
use crate::reliability::metrics::{NopStats, Stats};
use crate::sender::client::{ClientError, HttpTransport, build_transport};
use crate::sender::endpoint::destination_transform_url;
use crate::sender::metrics::TransformerMetricLabels;
use crate::sender::transmission::{BatchTransmitter, CallContext};
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

pub struct DestinationTransformerBuilder {
    config: TransformerConfig,
    stats: Option<Arc<dyn Stats>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl DestinationTransformerBuilder {
    /// Sink for request metrics. Defaults to [`NopStats`].
    pub fn stats(mut self, stats: Arc<dyn Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Replaces the transport that `client.client_type` would select.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<DestinationTransformer, BuildError> {
        self.config.validate()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => build_transport(self.config.timeout, &self.config.client)?,
        };
        let stats = self.stats.unwrap_or_else(|| Arc::new(NopStats));
        let transmitter = BatchTransmitter::new(Arc::clone(&transport), &self.config, stats);

        Ok(DestinationTransformer {
            config: self.config,
            transport_name: transport.name(),
            transmitter,
        })
    }
}

/// Client of the destination transformation service.
///
/// Cheap to share: hold it in an `Arc` and call [`transform`](Self::transform)
/// from as many tasks as needed.
pub struct DestinationTransformer {
    config: TransformerConfig,
    transport_name: &'static str,
    transmitter: BatchTransmitter,
}

impl DestinationTransformer {
    pub fn builder(config: TransformerConfig) -> DestinationTransformerBuilder {
        DestinationTransformerBuilder {
            config,
            stats: None,
            transport: None,
        }
    }

    pub fn new(config: TransformerConfig) -> Result<Self, BuildError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport_name
    }

    /// Transforms events that all share one destination.
    ///
    /// Returns one record per event, or an error if any batch hit an
    /// irrecoverable fault or `cancel` fired. The destination, URL and metric
    /// tags are taken from the first event.
    pub async fn transform(
        &self,
        cancel: &CancellationToken,
        events: Vec<TransformerEvent>,
    ) -> Result<Response, TransformerError> {
        let Some(first) = events.first() else {
            return Ok(Response::default());
        };

        let call = CallContext {
            url: destination_transform_url(
                &self.config.dest_transform_url,
                first.destination_type(),
                &self.config.warehouse,
            ),
            labels: TransformerMetricLabels::for_call(&self.config.dest_transform_url, first),
        };
        let event_count = events.len();
        let batches = split_into_batches(events, self.config.batch_size);
        let batch_count = batches.len();
        let start = Instant::now();

        let call_ref = &call;
        let parts: Result<Vec<Response>, TransformerError> = stream::iter(batches)
            .map(|batch| async move {
                let records = self.transmitter.send_batch(cancel, call_ref, &batch).await?;
                Ok::<_, TransformerError>(partition(records))
            })
            .buffer_unordered(self.config.max_concurrency)
            .try_collect()
            .await;

        match parts {
            Ok(parts) => {
                let response = merge(parts);
                info!(
                    url = %call.url,
                    events = event_count,
                    batches = batch_count,
                    succeeded = response.events.len(),
                    failed = response.failed_events.len(),
                    elapsed = ?start.elapsed(),
                    "Destination transformation completed"
                );
                Ok(response)
            }
            Err(err) => {
                if err.is_irrecoverable() {
                    error!(
                        url = %call.url,
                        events = event_count,
                        error = %err,
                        "Destination transformation aborted"
                    );
                }
                Err(err)
            }
        }
    }
}
