use thiserror::Error;

/// Synchronous rejection returned to the caller of `submit`.
///
/// Both variants are capacity signals, never fatal: the record has been discarded and the
/// caller decides whether to retry, sample, or give up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Ingress queue is full")]
    QueueFull,

    #[error("Pipeline is stopped")]
    Stopped,
}

impl SubmitError {
    /// `QueueFull` clears once workers catch up; `Stopped` is permanent.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SubmitError::QueueFull => true,
            SubmitError::Stopped => false,
        }
    }
}
