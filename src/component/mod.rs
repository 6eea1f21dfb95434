//! Collaborator contracts consumed by the pipeline and the manager.
//!
//! Concrete producers, transforms and sinks live outside this crate; the pipeline only sees
//! these traits. Each contract carries a self-reported [`ComponentStats`] and a health check
//! so the manager can aggregate them without knowing concrete types.

pub mod producer;
pub mod sink;
pub mod transform;

pub use producer::{Producer, ProducerState};
pub use sink::{NamedSink, Sink, SinkError, SinkSet};
pub use transform::{ChainOutcome, Transform, TransformChain, TransformError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Statistics a component reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentStats {
    /// Records handled (emitted by a producer, delivered by a sink, seen by a transform).
    pub processed: u64,
    pub errors: u64,
    pub last_active: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Lifecycle or health failure reported by a component.
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Component is not active")]
    Inactive,

    #[error("No activity for {idle_secs}s")]
    Stale { idle_secs: u64 },

    #[error("Component unhealthy: {0}")]
    Unhealthy(String),

    #[error("Start failed: {0}")]
    StartFailed(String),

    #[error("Stop failed: {0}")]
    StopFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Kind of registered component, used in manager errors and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Producer,
    Transform,
    Sink,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComponentKind::Producer => "producer",
            ComponentKind::Transform => "transform",
            ComponentKind::Sink => "sink",
        })
    }
}
