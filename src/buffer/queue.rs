use crate::app::config::MAX_QUEUE_CAPACITY;
use crate::buffer::SubmitError;
use crate::domain::LogRecord;
use crate::pipeline::stats::StatsCollector;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TryRecvError, error::TrySendError};
use tokio::sync::{Mutex, MutexGuard};

/// Bounded buffer between producers and workers.
///
/// Submission never waits: when the channel has no free slot the record is discarded and
/// counted. Workers share the single receiver through an async mutex, so whichever worker is
/// idle picks up the next record.
#[derive(Clone)]
pub struct IngressQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    sender: Sender<LogRecord>,
    receiver: Mutex<Receiver<LogRecord>>,
    closed: AtomicBool,
    capacity: usize,
    stats: Arc<StatsCollector>,
}

impl IngressQueue {
    /// Capacity is clamped to `1..=MAX_QUEUE_CAPACITY`; anything outside that range is
    /// rejected by validation before the pipeline starts.
    pub fn new(capacity: usize, stats: Arc<StatsCollector>) -> Self {
        let capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            inner: Arc::new(QueueInner {
                sender,
                receiver: Mutex::new(receiver),
                closed: AtomicBool::new(false),
                capacity,
                stats,
            }),
        }
    }

    pub fn submit(&self, record: LogRecord) -> Result<(), SubmitError> {
        if self.is_closed() {
            return Err(SubmitError::Stopped);
        }

        match self.inner.sender.try_send(record) {
            Ok(()) => {
                self.inner.stats.record_accepted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.inner.stats.record_dropped(1);
                Err(SubmitError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SubmitError::Stopped),
        }
    }

    /// Bind a write handle to a producer name.
    pub fn writer(&self, producer: impl Into<Arc<str>>) -> IngressWriter {
        IngressWriter {
            producer: producer.into(),
            queue: self.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Records currently buffered.
    pub fn len(&self) -> usize {
        self.inner
            .capacity
            .saturating_sub(self.inner.sender.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop admitting records. Already-buffered records stay readable.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub(crate) async fn lock_receiver(&self) -> MutexGuard<'_, Receiver<LogRecord>> {
        self.inner.receiver.lock().await
    }

    /// Close the channel itself and take everything still buffered.
    ///
    /// After the channel is closed no `try_send` can succeed, so the returned records are the
    /// complete remaining backlog.
    pub(crate) async fn close_and_drain(&self, max: usize) -> Vec<LogRecord> {
        self.close();
        let mut receiver = self.lock_receiver().await;
        receiver.close();

        let mut drained = Vec::new();
        while drained.len() < max {
            match receiver.try_recv() {
                Ok(record) => drained.push(record),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        drained
    }
}

/// Capability handle given to producers.
///
/// A writer can only submit records; it exposes neither the controller nor the queue.
#[derive(Clone)]
pub struct IngressWriter {
    producer: Arc<str>,
    queue: IngressQueue,
}

impl IngressWriter {
    /// Submit a record on behalf of the bound producer. Records without a source are stamped
    /// with the producer name.
    pub fn submit(&self, mut record: LogRecord) -> Result<(), SubmitError> {
        if record.source.is_empty() {
            record.source = self.producer.to_string();
        }
        self.queue.submit(record)
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl std::fmt::Debug for IngressWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressWriter")
            .field("producer", &self.producer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
