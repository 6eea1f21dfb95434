use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use crate::app::config::serde_helpers as duration_serde;

/// Per-worker counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerStats {
    pub id: usize,
    /// Records this worker has run through a flush.
    pub processed: u64,
    /// Transform failures plus sinks that gave up on one of this worker's batches.
    pub errors: u64,
    pub last_processed: Option<DateTime<Utc>>,
    #[serde(with = "duration_serde")]
    pub last_duration: Duration,
    /// True while the worker holds a non-empty, unflushed batch.
    pub active: bool,
    #[serde(skip)]
    pub(crate) last_active_at: Option<Instant>,
}

/// Point-in-time copy of the controller's statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Records admitted into the ingress queue.
    pub accepted: u64,
    /// Records taken out of a batch and run through the transform chain.
    pub processed: u64,
    /// Records acknowledged by a sink, counted once per sink.
    pub delivered: u64,
    /// Records vetoed by a transform.
    pub filtered: u64,
    /// Records rejected at ingress (queue full) or abandoned in the queue at shutdown.
    pub dropped: u64,
    /// Records lost to a transform error, or to a sink that exhausted its retries (once per sink).
    pub errored: u64,
    /// Sink attempts beyond the first.
    pub retries: u64,
    pub batches_flushed: u64,
    pub last_processed: Option<DateTime<Utc>>,
    #[serde(with = "duration_serde")]
    pub last_duration: Duration,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub workers: Vec<WorkerStats>,
}

impl PipelineStats {
    pub fn active_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.active).count()
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        self.queue_depth as f64 / self.queue_capacity as f64
    }
}

/// Outcome of one worker flush, applied to the statistics in a single lock acquisition.
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub records: usize,
    pub filtered: usize,
    pub transform_errors: usize,
    pub delivered: usize,
    pub errored: usize,
    pub sink_failures: usize,
    pub retries: u64,
    pub duration: Duration,
}

/// Owner of the statistics lock.
///
/// Every method holds the lock only for the counter update it performs; nothing here awaits.
#[derive(Debug)]
pub struct StatsCollector {
    inner: Mutex<PipelineStats>,
}

impl StatsCollector {
    pub fn new(queue_capacity: usize, worker_count: usize) -> Self {
        let workers = (0..worker_count)
            .map(|id| WorkerStats {
                id,
                ..Default::default()
            })
            .collect();

        Self {
            inner: Mutex::new(PipelineStats {
                queue_capacity,
                workers,
                ..Default::default()
            }),
        }
    }

    pub fn record_accepted(&self) {
        self.inner.lock().accepted += 1;
    }

    pub fn record_dropped(&self, count: u64) {
        self.inner.lock().dropped += count;
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.inner.lock().queue_depth = depth;
    }

    /// A record entered the worker's batch: the worker is active from now until its next flush.
    pub fn record_received(&self, worker_id: usize) {
        let mut stats = self.inner.lock();
        if let Some(worker) = stats.workers.get_mut(worker_id) {
            worker.active = true;
            worker.last_active_at = Some(Instant::now());
        }
    }

    pub fn record_flush(&self, worker_id: usize, report: &FlushReport) {
        let now = Utc::now();
        let mut stats = self.inner.lock();

        stats.processed += report.records as u64;
        stats.filtered += report.filtered as u64;
        stats.delivered += report.delivered as u64;
        stats.errored += (report.transform_errors + report.errored) as u64;
        stats.retries += report.retries;
        stats.batches_flushed += 1;
        stats.last_processed = Some(now);
        stats.last_duration = report.duration;

        if let Some(worker) = stats.workers.get_mut(worker_id) {
            worker.processed += report.records as u64;
            worker.errors += (report.transform_errors + report.sink_failures) as u64;
            worker.last_processed = Some(now);
            worker.last_duration = report.duration;
            worker.active = false;
            worker.last_active_at = Some(Instant::now());
        }
    }

    /// Most recent moment any worker held or flushed records. A worker that is active right now
    /// counts as active at the current instant.
    pub fn last_worker_activity(&self) -> Option<Instant> {
        let stats = self.inner.lock();
        if stats.workers.iter().any(|w| w.active) {
            return Some(Instant::now());
        }
        stats.workers.iter().filter_map(|w| w.last_active_at).max()
    }

    pub fn snapshot(&self) -> PipelineStats {
        self.inner.lock().clone()
    }
}
