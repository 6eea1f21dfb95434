use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single log/event entry flowing through the pipeline.
///
/// Records are treated as values: transforms take ownership and hand back either a
/// replacement record or nothing (a veto). Nothing downstream of a producer mutates a record
/// it does not own, which keeps batch contents stable across sink retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    /// Identifier of the producer (or upstream service) that emitted the record.
    pub source: String,
    pub timestamp: DateTime<Utc>,

    // Origin
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    // Trace context
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub span_id: Option<String>,

    // Open key-value metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            source: source.into(),
            timestamp: Utc::now(),
            host: None,
            labels: BTreeMap::new(),
            trace_id: None,
            span_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn info(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message, source)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
