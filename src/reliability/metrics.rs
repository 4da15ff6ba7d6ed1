//! Stats sinks.
//!
//! The transformer only talks to the [`Stats`] trait. Pick [`NopStats`] when
//! nothing should be recorded, [`MemoryStats`] for tests and [`PrometheusStats`]
//! (feature `metrics`) for a text exposition.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "metrics")]
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::collections::HashMap;

pub type Tags = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[cfg(feature = "metrics")]
    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
    #[error("Metrics export error: {0}")]
    ExportError(String),
}

/// Named, tagged measurements. Must tolerate concurrent callers.
pub trait Stats: Send + Sync {
    fn count(&self, name: &str, tags: &Tags, value: u64);
    fn timing(&self, name: &str, tags: &Tags, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NopStats;

impl Stats for NopStats {
    fn count(&self, _name: &str, _tags: &Tags, _value: u64) {}
    fn timing(&self, _name: &str, _tags: &Tags, _duration: Duration) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementKind {
    Count,
    Timer,
}

/// Aggregate of everything recorded under one name and tag set.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub kind: MeasurementKind,
    pub tags: Tags,
    /// Counter total, or number of observations for timers.
    pub value: u64,
    pub durations: Vec<Duration>,
}

/// In-memory collector.
#[derive(Debug, Default)]
pub struct MemoryStats {
    measurements: Mutex<BTreeMap<(String, Tags), Measurement>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per distinct tag set recorded under `name`.
    pub fn get_by_name(&self, name: &str) -> Vec<Measurement> {
        self.measurements
            .lock()
            .values()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str, tags: &Tags) -> Option<Measurement> {
        self.measurements
            .lock()
            .get(&(name.to_string(), tags.clone()))
            .cloned()
    }

    pub fn all(&self) -> Vec<Measurement> {
        self.measurements.lock().values().cloned().collect()
    }

    fn record(&self, name: &str, tags: &Tags, kind: MeasurementKind, value: u64, duration: Option<Duration>) {
        let mut measurements = self.measurements.lock();
        let entry = measurements
            .entry((name.to_string(), tags.clone()))
            .or_insert_with(|| Measurement {
                name: name.to_string(),
                kind,
                tags: tags.clone(),
                value: 0,
                durations: Vec::new(),
            });
        entry.value += value;
        entry.durations.extend(duration);
    }
}

impl Stats for MemoryStats {
    fn count(&self, name: &str, tags: &Tags, value: u64) {
        self.record(name, tags, MeasurementKind::Count, value, None);
    }

    fn timing(&self, name: &str, tags: &Tags, duration: Duration) {
        self.record(name, tags, MeasurementKind::Timer, 1, Some(duration));
    }
}

/// Prometheus sink. Collectors are registered the first time a name is seen,
/// with that call's tag keys as label names.
#[cfg(feature = "metrics")]
pub struct PrometheusStats {
    registry: Registry,
    counters: Mutex<HashMap<String, CounterVec>>,
    histograms: Mutex<HashMap<String, HistogramVec>>,
}

#[cfg(feature = "metrics")]
impl PrometheusStats {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }

    /// Text exposition of every registered collector.
    pub fn export(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
    }

    fn counter(&self, name: &str, tags: &Tags) -> Result<CounterVec, MetricsError> {
        let mut counters = self.counters.lock();
        if let Some(counter) = counters.get(name) {
            return Ok(counter.clone());
        }
        let labels: Vec<&str> = tags.keys().map(String::as_str).collect();
        let counter = CounterVec::new(Opts::new(name, name), &labels)?;
        self.registry.register(Box::new(counter.clone()))?;
        counters.insert(name.to_string(), counter.clone());
        Ok(counter)
    }

    fn histogram(&self, name: &str, tags: &Tags) -> Result<HistogramVec, MetricsError> {
        let mut histograms = self.histograms.lock();
        if let Some(histogram) = histograms.get(name) {
            return Ok(histogram.clone());
        }
        let labels: Vec<&str> = tags.keys().map(String::as_str).collect();
        let histogram = HistogramVec::new(HistogramOpts::new(name, name), &labels)?;
        self.registry.register(Box::new(histogram.clone()))?;
        histograms.insert(name.to_string(), histogram.clone());
        Ok(histogram)
    }
}

#[cfg(feature = "metrics")]
impl Default for PrometheusStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics")]
fn label_values(tags: &Tags) -> Vec<&str> {
    tags.values().map(String::as_str).collect()
}

#[cfg(feature = "metrics")]
impl Stats for PrometheusStats {
    fn count(&self, name: &str, tags: &Tags, value: u64) {
        let result = self.counter(name, tags).and_then(|counter| {
            counter
                .get_metric_with_label_values(&label_values(tags))
                .map_err(MetricsError::from)
        });
        match result {
            Ok(counter) => counter.inc_by(value as f64),
            Err(e) => tracing::debug!(metric = name, error = %e, "Dropping counter sample"),
        }
    }

    fn timing(&self, name: &str, tags: &Tags, duration: Duration) {
        let result = self.histogram(name, tags).and_then(|histogram| {
            histogram
                .get_metric_with_label_values(&label_values(tags))
                .map_err(MetricsError::from)
        });
        match result {
            Ok(histogram) => histogram.observe(duration.as_secs_f64()),
            Err(e) => tracing::debug!(metric = name, error = %e, "Dropping timer sample"),
        }
    }
}
