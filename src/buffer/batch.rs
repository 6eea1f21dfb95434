use crate::domain::LogRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Why a batch left the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushTrigger {
    SizeBased,
    TimeBased,
    Shutdown,
}

/// A flushed batch on its way through the transform chain and out to sinks.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    records: Vec<LogRecord>,
    trigger: FlushTrigger,
}

impl Batch {
    pub fn new(records: Vec<LogRecord>, trigger: FlushTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            records,
            trigger,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }
}

/// Upper bound on the slots reserved up front; larger batches grow on demand.
const MAX_PREALLOCATED: usize = 1024;

/// Worker-local accumulator with an explicit flush deadline.
///
/// The deadline is armed by the first record after a flush and disarmed by `take`, so the
/// worker loop only has to race the queue against `deadline()`.
#[derive(Debug)]
pub struct PendingBatch {
    records: Vec<LogRecord>,
    max_size: usize,
    max_wait: Duration,
    deadline: Option<Instant>,
}

impl PendingBatch {
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: Vec::with_capacity(max_size.min(MAX_PREALLOCATED)),
            max_size,
            max_wait,
            deadline: None,
        }
    }

    /// Append a record. Returns true when the batch has reached its size threshold.
    pub fn push(&mut self, record: LogRecord) -> bool {
        if self.records.is_empty() {
            self.deadline = Some(Instant::now() + self.max_wait);
        }
        self.records.push(record);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.max_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hand the accumulated records over as a batch and reset to idle.
    pub fn take(&mut self, trigger: FlushTrigger) -> Batch {
        self.deadline = None;
        let reserved = self.max_size.min(MAX_PREALLOCATED);
        let records = std::mem::replace(&mut self.records, Vec::with_capacity(reserved));
        Batch::new(records, trigger)
    }
}
