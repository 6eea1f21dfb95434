use super::{ComponentError, ComponentStats};
use crate::domain::LogRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Destination for completed batches.
///
/// `deliver` may be called again with the same batch after a failure; deduplication is the
/// sink's responsibility.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, batch: &[LogRecord]) -> Result<(), SinkError>;

    async fn start(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    fn stats(&self) -> ComponentStats {
        ComponentStats::default()
    }

    fn health_check(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct NamedSink {
    pub name: Arc<str>,
    pub sink: Arc<dyn Sink>,
}

/// Registered sinks, swapped as a whole on edits like [`TransformChain`](super::TransformChain).
#[derive(Clone, Default)]
pub struct SinkSet {
    sinks: Vec<NamedSink>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedSink> {
        self.sinks.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name.as_ref()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sinks.iter().any(|s| s.name.as_ref() == name)
    }

    pub fn with(&self, name: &str, sink: Arc<dyn Sink>) -> Option<Self> {
        if self.contains(name) {
            return None;
        }
        let mut sinks = self.sinks.clone();
        sinks.push(NamedSink {
            name: Arc::from(name),
            sink,
        });
        Some(Self { sinks })
    }

    pub fn without(&self, name: &str) -> Option<Self> {
        if !self.contains(name) {
            return None;
        }
        let sinks = self
            .sinks
            .iter()
            .filter(|s| s.name.as_ref() != name)
            .cloned()
            .collect();
        Some(Self { sinks })
    }
}
