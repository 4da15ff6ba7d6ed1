use super::config::{LogFormat, LogLevel};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {message}")]
    InvalidDirective { directive: String, message: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InitFailed(String),
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Filter directives plus the process-wide subscriber built from them.
pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<String>>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add_directive(&self, directive: &str) -> Result<(), LoggingError> {
        directive
            .parse::<Directive>()
            .map_err(|e| LoggingError::InvalidDirective {
                directive: directive.to_string(),
                message: e.to_string(),
            })?;
        self.directives.write().push(directive.to_string());
        Ok(())
    }

    /// Quiets the HTTP stack below warn.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            directives.push(format!("{target}=warn"));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(level_str(default_level).to_string());
        filter_parts.extend(directives.iter().cloned());
        filter_parts.join(",")
    }

    /// `RUST_LOG` wins over the configured level when set.
    pub fn env_filter(&self, default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let filter_string = self.build_filter_string(default_level);
        EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::InvalidDirective {
            directive: filter_string,
            message: e.to_string(),
        })
    }

    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let env_filter = self.env_filter(default_level)?;
        let registry = tracing_subscriber::registry().with(env_filter);

        // stdout carries the transform result
        let result = match format {
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .json()
                        .with_current_span(false),
                )
                .try_init(),
        };
        result.map_err(|e| LoggingError::InitFailed(e.to_string()))
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

pub fn setup_logging(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    let logging_system = LoggingSystem::new();
    logging_system.add_default_directives();
    logging_system.initialize_tracing(level, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_valid_directive() {
        let logging_system = LoggingSystem::new();
        assert!(logging_system.add_directive("hyper=warn").is_ok());
        assert!(logging_system.add_directive("dest_transformer::sender=debug").is_ok());
        assert_eq!(logging_system.directive_count(), 2);
    }

    #[test]
    fn test_reject_invalid_directive() {
        let logging_system = LoggingSystem::new();
        let err = logging_system.add_directive("target=loud").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidDirective { .. }));
        assert_eq!(logging_system.directive_count(), 0);
    }

    #[test]
    fn test_build_filter_string() {
        let logging_system = LoggingSystem::new();
        assert_eq!(logging_system.build_filter_string(LogLevel::Info), "info");

        logging_system.add_default_directives();
        let filter = logging_system.build_filter_string(LogLevel::Debug);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }
}
