use super::{ComponentError, ComponentStats};
use crate::domain::LogRecord;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Missing field: {field}")]
    MissingField { field: String },

    #[error("Transform failed: {0}")]
    Failed(String),
}

/// Per-record step applied before delivery.
///
/// `Ok(Some(record))` passes a (possibly replaced) record on, `Ok(None)` vetoes it, and an
/// error skips the record for this batch. A transform never sees batches.
pub trait Transform: Send + Sync {
    fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError>;

    fn stats(&self) -> ComponentStats {
        ComponentStats::default()
    }

    fn health_check(&self) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// What the chain decided for one record.
#[derive(Debug)]
pub enum ChainOutcome {
    Kept(LogRecord),
    Vetoed { by: Arc<str> },
    Failed { by: Arc<str>, error: TransformError },
}

/// Ordered, named transforms.
///
/// The pipeline swaps whole chains when transforms are added or removed, so a worker that
/// cloned the chain for a flush is unaffected by concurrent edits.
#[derive(Clone, Default)]
pub struct TransformChain {
    transforms: Vec<(Arc<str>, Arc<dyn Transform>)>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|(name, _)| name.as_ref()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.iter().any(|(n, _)| n.as_ref() == name)
    }

    /// Chain with `transform` appended. Returns `None` if the name is taken.
    pub fn with(&self, name: &str, transform: Arc<dyn Transform>) -> Option<Self> {
        if self.contains(name) {
            return None;
        }
        let mut transforms = self.transforms.clone();
        transforms.push((Arc::from(name), transform));
        Some(Self { transforms })
    }

    /// Chain without `name`. Returns `None` if no such transform exists.
    pub fn without(&self, name: &str) -> Option<Self> {
        if !self.contains(name) {
            return None;
        }
        let transforms = self
            .transforms
            .iter()
            .filter(|(n, _)| n.as_ref() != name)
            .cloned()
            .collect();
        Some(Self { transforms })
    }

    /// Run every transform in order until one vetoes or fails.
    pub fn apply(&self, record: LogRecord) -> ChainOutcome {
        let mut current = record;

        for (name, transform) in &self.transforms {
            match transform.apply(current) {
                Ok(Some(next)) => current = next,
                Ok(None) => return ChainOutcome::Vetoed { by: name.clone() },
                Err(error) => {
                    return ChainOutcome::Failed {
                        by: name.clone(),
                        error,
                    };
                }
            }
        }

        ChainOutcome::Kept(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLevel;

    struct Uppercase;
    impl Transform for Uppercase {
        fn apply(&self, mut record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
            record.message = record.message.to_uppercase();
            Ok(Some(record))
        }
    }

    struct DropDebug;
    impl Transform for DropDebug {
        fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
            Ok((record.level > LogLevel::Debug).then_some(record))
        }
    }

    struct RequireHost;
    impl Transform for RequireHost {
        fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
            if record.host.is_none() {
                return Err(TransformError::MissingField {
                    field: "host".to_string(),
                });
            }
            Ok(Some(record))
        }
    }

    fn chain() -> TransformChain {
        TransformChain::new()
            .with("drop-debug", Arc::new(DropDebug))
            .and_then(|c| c.with("upper", Arc::new(Uppercase)))
            .and_then(|c| c.with("require-host", Arc::new(RequireHost)))
            .unwrap()
    }

    #[test]
    fn applies_in_order() {
        let record = LogRecord::info("hello", "t").with_host("h");
        match chain().apply(record) {
            ChainOutcome::Kept(r) => assert_eq!(r.message, "HELLO"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn veto_short_circuits() {
        let record = LogRecord::new(LogLevel::Debug, "noise", "t");
        match chain().apply(record) {
            ChainOutcome::Vetoed { by } => assert_eq!(by.as_ref(), "drop-debug"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn error_names_the_failing_transform() {
        let record = LogRecord::info("no host", "t");
        match chain().apply(record) {
            ChainOutcome::Failed { by, error } => {
                assert_eq!(by.as_ref(), "require-host");
                assert!(matches!(error, TransformError::MissingField { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn with_and_without_respect_names() {
        let chain = chain();
        assert!(chain.with("upper", Arc::new(Uppercase)).is_none());
        assert!(chain.without("missing").is_none());

        let smaller = chain.without("upper").unwrap();
        assert_eq!(smaller.names(), vec!["drop-debug", "require-host"]);
        // Edits return a new chain; this one is untouched.
        assert_eq!(chain.len(), 3);
    }
}
