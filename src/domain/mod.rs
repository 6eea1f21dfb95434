//! Domain layer for rask-log-pipeline.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord`: The pipeline's unit of work
//! - `LogLevel`: Record severity (Trace/Debug/Info/Warn/Error/Fatal)
//! - `PipelineError`: Controller lifecycle error type

pub mod error;
pub mod log_level;
pub mod log_record;

pub use error::PipelineError;
pub use log_level::LogLevel;
pub use log_record::LogRecord;
