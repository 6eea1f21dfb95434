use crate::app::ConfigError;
use thiserror::Error;

/// Lifecycle errors returned by the pipeline controller.
///
/// Record-level failures (queue full, transform or sink errors) never surface here; they are
/// reported through `SubmitError` or counted in statistics.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline already running")]
    AlreadyRunning,

    #[error("Pipeline has been stopped and cannot be restarted")]
    Stopped,

    #[error("Worker {worker_id} terminated abnormally: {reason}")]
    WorkerFailed { worker_id: usize, reason: String },
}

impl PipelineError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::AlreadyRunning | PipelineError::WorkerFailed { .. } => true,
            PipelineError::Config(_) | PipelineError::Stopped => false,
        }
    }
}
