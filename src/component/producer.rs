use super::{ComponentError, ComponentStats};
use crate::buffer::{IngressWriter, SubmitError};
use crate::domain::LogRecord;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::time::Duration;

/// Source of records.
///
/// The manager calls `attach` once at registration with a writer bound to the producer's
/// name; the producer submits through that writer from `start` until `stop`.
#[async_trait]
pub trait Producer: Send + Sync {
    fn attach(&self, writer: IngressWriter);

    async fn start(&self) -> Result<(), ComponentError>;

    async fn stop(&self) -> Result<(), ComponentError>;

    fn stats(&self) -> ComponentStats;

    fn health_check(&self) -> Result<(), ComponentError>;
}

/// Shared bookkeeping for producer implementations.
///
/// Holds the attached writer, counts submitted and rejected records, and answers the health
/// check: a producer is unhealthy while inactive or after `stale_after` without a successful
/// submit.
#[derive(Debug)]
pub struct ProducerState {
    writer: RwLock<Option<IngressWriter>>,
    stats: RwLock<ComponentStats>,
    stale_after: Duration,
}

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

impl ProducerState {
    pub fn new() -> Self {
        Self::with_stale_after(DEFAULT_STALE_AFTER)
    }

    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            writer: RwLock::new(None),
            stats: RwLock::new(ComponentStats::default()),
            stale_after,
        }
    }

    pub fn attach(&self, writer: IngressWriter) {
        *self.writer.write() = Some(writer);
    }

    pub fn set_active(&self, active: bool) {
        self.stats.write().active = active;
    }

    /// Submit through the attached writer and record the outcome. A producer that was never
    /// attached behaves like a stopped pipeline.
    pub fn emit(&self, record: LogRecord) -> Result<(), SubmitError> {
        let writer = self.writer.read().clone();
        let result = match writer {
            Some(writer) => writer.submit(record),
            None => Err(SubmitError::Stopped),
        };

        let mut stats = self.stats.write();
        match result {
            Ok(()) => {
                stats.processed += 1;
                stats.last_active = Some(Utc::now());
                stats.active = true;
            }
            Err(_) => stats.errors += 1,
        }
        result
    }

    pub fn stats(&self) -> ComponentStats {
        self.stats.read().clone()
    }

    pub fn health_check(&self) -> Result<(), ComponentError> {
        let stats = self.stats.read();
        if !stats.active {
            return Err(ComponentError::Inactive);
        }

        if let Some(last) = stats.last_active {
            let idle = (Utc::now() - last).to_std().unwrap_or_default();
            if idle > self.stale_after {
                return Err(ComponentError::Stale {
                    idle_secs: idle.as_secs(),
                });
            }
        }

        Ok(())
    }
}

impl Default for ProducerState {
    fn default() -> Self {
        Self::new()
    }
}
