use super::config::{LogFormat, LoggingConfig, TracingLevel};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Logging initialization failed: {details}")]
    InitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Builds the `EnvFilter` + `fmt` subscriber used for the pipeline's own diagnostics.
pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<String>>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a `target=level` directive. Invalid directives are rejected up front so that a
    /// typo in configuration does not silently widen or narrow the filter.
    pub fn add_directive(&self, directive: &str) -> Result<(), LoggingError> {
        let directive = directive.trim();
        let Some((target, level)) = directive.split_once('=') else {
            return Err(LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: "expected target=level".to_string(),
            });
        };

        if target.is_empty() {
            return Err(LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: "empty target".to_string(),
            });
        }

        if level.parse::<tracing::Level>().is_err() && level != "off" {
            return Err(LoggingError::InvalidDirective {
                directive: directive.to_string(),
                reason: format!("unknown level '{level}'"),
            });
        }

        self.directives.write().push(directive.to_string());
        Ok(())
    }

    /// Quiet the async runtime internals by default.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["tokio", "runtime", "mio"] {
            directives.push(format!("{target}=warn"));
        }
    }

    pub fn build_filter_string(&self, default_level: TracingLevel) -> String {
        let directives = self.directives.read();

        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().cloned());
        filter_parts.join(",")
    }

    pub fn initialize_tracing(
        &self,
        default_level: TracingLevel,
        format: LogFormat,
    ) -> Result<(), LoggingError> {
        let filter_string = self.build_filter_string(default_level);

        let env_filter =
            EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::InitFailed {
                details: format!("Failed to create EnvFilter with '{filter_string}'"),
                source: Box::new(e),
            })?;

        let result = match format {
            LogFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .compact(),
                )
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_current_span(false))
                .try_init(),
        };

        result.map_err(|e| LoggingError::InitFailed {
            details: "Failed to set global tracing subscriber".to_string(),
            source: Box::new(e),
        })
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

/// Install the global subscriber described by `config`.
pub fn setup_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let system = LoggingSystem::new();
    system.add_default_directives();
    for directive in &config.directives {
        system.add_directive(directive)?;
    }
    system.initialize_tracing(config.level, config.format)
}
