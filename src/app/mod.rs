pub mod config;
pub mod logging_system;

pub use config::{Config, ConfigError, LogFormat, LoggingConfig, PipelineConfig, TracingLevel};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging};
