use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub(crate) mod serde_helpers;
mod validation;

use serde_helpers as duration_serde;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Level for the pipeline's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl TracingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingLevel::Error => "error",
            TracingLevel::Warn => "warn",
            TracingLevel::Info => "info",
            TracingLevel::Debug => "debug",
            TracingLevel::Trace => "trace",
        }
    }
}

impl From<TracingLevel> for tracing::Level {
    fn from(level: TracingLevel) -> Self {
        match level {
            TracingLevel::Error => tracing::Level::ERROR,
            TracingLevel::Warn => tracing::Level::WARN,
            TracingLevel::Info => tracing::Level::INFO,
            TracingLevel::Debug => tracing::Level::DEBUG,
            TracingLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Output format of the diagnostics subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: TracingLevel,
    pub format: LogFormat,
    /// Extra `target=level` directives appended to the filter.
    pub directives: Vec<String>,
}

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SATURATION_THRESHOLD: f64 = 0.9;

/// Largest channel the ingress queue can be built with.
pub const MAX_QUEUE_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;
pub const MAX_WORKER_COUNT: usize = 1024;

/// Tunables for the pipeline controller and the manager loops around it.
///
/// Every field is optional when deserializing. Zero values mean "unset" and are replaced by
/// the defaults in [`PipelineConfig::with_defaults`], which `Pipeline::new` always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max buffered records before producers are rejected.
    pub queue_capacity: usize,
    /// Number of parallel draining workers.
    pub worker_count: usize,
    /// Records per size-triggered flush.
    pub batch_size: usize,
    /// Max time a partial batch waits before a forced flush.
    #[serde(with = "duration_serde")]
    pub flush_interval: Duration,
    /// Budget for one sink's dispatch of one batch, retries included.
    #[serde(with = "duration_serde")]
    pub process_timeout: Duration,
    /// Additional attempts per sink after the first failure.
    pub retry_count: u32,
    /// Base backoff unit, scaled linearly by attempt index.
    #[serde(with = "duration_serde")]
    pub retry_delay: Duration,
    /// Manager health cadence; also the controller's worker activity window.
    #[serde(with = "duration_serde")]
    pub health_check_interval: Duration,
    #[serde(with = "duration_serde")]
    pub stats_interval: Duration,
    /// Queue fill ratio at which the controller reports itself unhealthy.
    pub saturation_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Replace zero/unset fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        fn or_default<T: PartialEq + Default>(value: &mut T, default: T) {
            if *value == T::default() {
                *value = default;
            }
        }

        or_default(&mut self.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        or_default(&mut self.worker_count, DEFAULT_WORKER_COUNT);
        or_default(&mut self.batch_size, DEFAULT_BATCH_SIZE);
        or_default(&mut self.flush_interval, DEFAULT_FLUSH_INTERVAL);
        or_default(&mut self.process_timeout, DEFAULT_PROCESS_TIMEOUT);
        or_default(&mut self.retry_count, DEFAULT_RETRY_COUNT);
        or_default(&mut self.retry_delay, DEFAULT_RETRY_DELAY);
        or_default(&mut self.health_check_interval, DEFAULT_HEALTH_CHECK_INTERVAL);
        or_default(&mut self.stats_interval, DEFAULT_STATS_INTERVAL);
        or_default(&mut self.saturation_threshold, DEFAULT_SATURATION_THRESHOLD);
        self
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(contents)?;
        Ok(config.with_defaults())
    }

    /// Load a bare pipeline table from a TOML file. Validation happens at `Pipeline::start`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Queue depth at or above which the controller reports saturation.
    pub fn saturation_depth(&self) -> usize {
        ((self.queue_capacity as f64) * self.saturation_threshold).ceil() as usize
    }
}

/// Complete configuration file: pipeline tunables plus diagnostics setup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.pipeline = config.pipeline.with_defaults();
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
