#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rask_log_pipeline::component::{ComponentError, ComponentStats};
use rask_log_pipeline::{LogLevel, LogRecord, Sink, SinkError, Transform, TransformError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Sink that remembers every batch it accepted.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<LogRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Vec::len).collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    pub fn sources(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|r| r.source.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|r| r.message.clone())
            .collect()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn deliver(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }

    fn stats(&self) -> ComponentStats {
        ComponentStats {
            processed: self.record_count() as u64,
            ..Default::default()
        }
    }
}

/// Sink that fails its first `failures` calls, then succeeds.
pub struct FlakySink {
    failures: u32,
    calls: AtomicU32,
    delivered: AtomicU64,
}

impl FlakySink {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            delivered: AtomicU64::new(0),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for FlakySink {
    async fn deliver(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SinkError::Unavailable(format!("attempt {}", call + 1)));
        }
        self.delivered.fetch_add(batch.len() as u64, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that blocks every delivery until a permit is released.
pub struct GatedSink {
    gate: Semaphore,
}

impl GatedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
        })
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl Sink for GatedSink {
    async fn deliver(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        self.gate
            .acquire()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?
            .forget();
        Ok(())
    }
}

/// Sink whose health check always fails.
pub struct BrokenSink;

#[async_trait]
impl Sink for BrokenSink {
    async fn deliver(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("broken".to_string()))
    }

    fn health_check(&self) -> Result<(), ComponentError> {
        Err(ComponentError::Unhealthy("disk full".to_string()))
    }
}

/// Sink whose `start` fails until `allow_start` is called. Counts lifecycle calls.
#[derive(Default)]
pub struct StartGateSink {
    allowed: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
}

impl StartGateSink {
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn allow_start(&self) {
        self.allowed.store(true, Ordering::SeqCst);
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for StartGateSink {
    async fn deliver(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), ComponentError> {
        if !self.allowed.load(Ordering::SeqCst) {
            return Err(ComponentError::StartFailed("endpoint unreachable".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Vetoes records below `min`.
pub struct LevelFilter {
    pub min: LogLevel,
}

impl Transform for LevelFilter {
    fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
        Ok((record.level >= self.min).then_some(record))
    }
}

/// Fails on records carrying a `poison` metadata key.
pub struct RejectPoison;

impl Transform for RejectPoison {
    fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
        if record.metadata("poison").is_some() {
            return Err(TransformError::InvalidRecord(record.message));
        }
        Ok(Some(record))
    }
}

pub fn record(message: &str) -> LogRecord {
    LogRecord::info(message, "test")
}

/// Poll `condition` until it holds or `timeout` of (possibly paused) tokio time elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
