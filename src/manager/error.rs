use crate::component::{ComponentError, ComponentKind};
use crate::domain::PipelineError;
use crate::pipeline::HealthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("{kind} '{name}' already registered")]
    AlreadyExists { kind: ComponentKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ComponentKind, name: String },

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Pipeline unhealthy: {0}")]
    PipelineUnhealthy(#[from] HealthError),

    #[error("{kind} '{name}' failed: {source}")]
    Component {
        kind: ComponentKind,
        name: String,
        #[source]
        source: ComponentError,
    },
}

impl ManagerError {
    pub(crate) fn component(kind: ComponentKind, name: &str, source: ComponentError) -> Self {
        ManagerError::Component {
            kind,
            name: name.to_string(),
            source,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ManagerError::AlreadyExists { .. } | ManagerError::NotFound { .. } => false,
            ManagerError::Pipeline(e) => e.is_recoverable(),
            ManagerError::PipelineUnhealthy(e) => e.is_recoverable(),
            ManagerError::Component { .. } => true,
        }
    }
}
