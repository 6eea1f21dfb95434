//! Pipeline controller: ingress queue, worker pool, transform chain and sink dispatch.

mod dispatch;
pub mod stats;
mod worker;

pub use stats::{PipelineStats, WorkerStats};

use crate::app::PipelineConfig;
use crate::app::config::MAX_WORKER_COUNT;
use crate::buffer::{IngressQueue, IngressWriter, SubmitError};
use crate::component::{Sink, SinkSet, Transform, TransformChain};
use crate::domain::{LogRecord, PipelineError};
use crate::reliability::RetryPolicy;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use stats::StatsCollector;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use worker::Worker;

/// Why the controller reports itself unhealthy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HealthError {
    #[error("Pipeline is not running")]
    NotRunning,

    #[error("No worker activity for {idle:?} (window {window:?})")]
    Inactive { idle: Duration, window: Duration },

    #[error("Ingress queue saturated: {depth}/{capacity}")]
    Saturated { depth: usize, capacity: usize },
}

impl HealthError {
    /// Saturation and inactivity can clear on their own; a stopped pipeline cannot.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, HealthError::NotRunning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Current transform chain and sink set. Workers clone the `Arc`s at flush time, edits swap
/// them wholesale.
#[derive(Default)]
pub(crate) struct ActiveComponents {
    transforms: RwLock<Arc<TransformChain>>,
    sinks: RwLock<Arc<SinkSet>>,
}

impl ActiveComponents {
    pub(crate) fn current(&self) -> (Arc<TransformChain>, Arc<SinkSet>) {
        (self.transforms.read().clone(), self.sinks.read().clone())
    }
}

/// Concurrent log pipeline.
///
/// Records submitted through [`Pipeline::submit`] or an [`IngressWriter`] are buffered in a
/// bounded queue, picked up by `worker_count` workers, batched by size and time, run through
/// the transform chain and delivered to every sink with linear-backoff retry.
pub struct Pipeline {
    config: PipelineConfig,
    queue: IngressQueue,
    stats: Arc<StatsCollector>,
    components: Arc<ActiveComponents>,
    cancel: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    started_at: Mutex<Option<Instant>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build a stopped pipeline. Zero config values are replaced by defaults; the rest is
    /// validated by [`Pipeline::start`]. Out-of-range sizes are clamped here so construction
    /// never fails.
    pub fn new(config: PipelineConfig) -> Self {
        let config = config.with_defaults();
        let stats = Arc::new(StatsCollector::new(
            config.queue_capacity,
            config.worker_count.min(MAX_WORKER_COUNT),
        ));
        let queue = IngressQueue::new(config.queue_capacity, stats.clone());

        Self {
            config,
            queue,
            stats,
            components: Arc::new(ActiveComponents::default()),
            cancel: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Created),
            started_at: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Running
    }

    /// Spawn the workers and the statistics refresh loop.
    pub async fn start(&self) -> Result<(), PipelineError> {
        self.config.validate()?;

        {
            let mut lifecycle = self.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Running => return Err(PipelineError::AlreadyRunning),
                Lifecycle::Stopped => return Err(PipelineError::Stopped),
                Lifecycle::Created => *lifecycle = Lifecycle::Running,
            }
        }
        *self.started_at.lock() = Some(Instant::now());

        let retry = RetryPolicy::new(self.config.retry_count, self.config.retry_delay);
        let mut handles = Vec::with_capacity(self.config.worker_count + 1);

        for id in 0..self.config.worker_count {
            let worker = Worker {
                id,
                queue: self.queue.clone(),
                stats: self.stats.clone(),
                components: self.components.clone(),
                batch_size: self.config.batch_size,
                flush_interval: self.config.flush_interval,
                retry,
                process_timeout: self.config.process_timeout,
                cancel: self.cancel.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        handles.push(tokio::spawn(refresh_stats(
            self.queue.clone(),
            self.stats.clone(),
            self.config.stats_interval,
            self.cancel.clone(),
        )));

        *self.tasks.lock() = handles;

        info!(
            workers = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "Pipeline started"
        );
        Ok(())
    }

    /// Stop admitting records, let workers drain the backlog, and wait for them to exit.
    ///
    /// Calling `stop` again is a no-op. Records still queued after every worker has exited
    /// (only possible if the pipeline was never started) are counted as dropped.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Stopped {
                return Ok(());
            }
            *lifecycle = Lifecycle::Stopped;
        }

        info!("Stopping pipeline");
        self.queue.close();
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock());
        let worker_count = self.config.worker_count;
        let mut failure = None;

        for (id, result) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                if id < worker_count {
                    error!(worker_id = id, error = %e, "Worker terminated abnormally");
                    failure.get_or_insert(PipelineError::WorkerFailed {
                        worker_id: id,
                        reason: e.to_string(),
                    });
                } else {
                    warn!(error = %e, "Statistics loop terminated abnormally");
                }
            }
        }

        let leftovers = self.queue.close_and_drain(usize::MAX).await;
        if !leftovers.is_empty() {
            warn!(records = leftovers.len(), "Dropping records left in queue");
            self.stats.record_dropped(leftovers.len() as u64);
        }
        self.stats.set_queue_depth(self.queue.len());

        let snapshot = self.stats.snapshot();
        info!(
            accepted = snapshot.accepted,
            delivered = snapshot.delivered,
            filtered = snapshot.filtered,
            errored = snapshot.errored,
            dropped = snapshot.dropped,
            "Pipeline stopped"
        );

        failure.map_or(Ok(()), Err)
    }

    /// Non-blocking submit. Fails with [`SubmitError::QueueFull`] when the queue is at
    /// capacity and [`SubmitError::Stopped`] after `stop`.
    pub fn submit(&self, record: LogRecord) -> Result<(), SubmitError> {
        self.queue.submit(record)
    }

    pub fn writer(&self, producer: &str) -> IngressWriter {
        self.queue.writer(producer)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot(&self) -> PipelineStats {
        let mut snapshot = self.stats.snapshot();
        snapshot.queue_depth = self.queue.len();
        snapshot
    }

    /// Advisory health: running, some worker active within `health_check_interval`, and the
    /// queue below the saturation threshold.
    pub fn health_check(&self) -> Result<(), HealthError> {
        if !self.is_running() {
            return Err(HealthError::NotRunning);
        }

        let window = self.config.health_check_interval;
        let started = self.started_at.lock().unwrap_or_else(Instant::now);
        let last_activity = self
            .stats
            .last_worker_activity()
            .map_or(started, |at| at.max(started));
        let idle = last_activity.elapsed();
        if idle > window {
            return Err(HealthError::Inactive { idle, window });
        }

        let depth = self.queue.len();
        if depth >= self.config.saturation_depth() {
            return Err(HealthError::Saturated {
                depth,
                capacity: self.queue.capacity(),
            });
        }

        Ok(())
    }

    /// Append a transform to the chain. Returns false if the name is already taken.
    pub fn add_transform(&self, name: &str, transform: Arc<dyn Transform>) -> bool {
        let mut current = self.components.transforms.write();
        match current.with(name, transform) {
            Some(next) => {
                *current = Arc::new(next);
                debug!(transform = name, "Transform added");
                true
            }
            None => false,
        }
    }

    pub fn remove_transform(&self, name: &str) -> bool {
        let mut current = self.components.transforms.write();
        match current.without(name) {
            Some(next) => {
                *current = Arc::new(next);
                debug!(transform = name, "Transform removed");
                true
            }
            None => false,
        }
    }

    /// Register a sink. Returns false if the name is already taken.
    pub fn add_sink(&self, name: &str, sink: Arc<dyn Sink>) -> bool {
        let mut current = self.components.sinks.write();
        match current.with(name, sink) {
            Some(next) => {
                *current = Arc::new(next);
                debug!(sink = name, "Sink added");
                true
            }
            None => false,
        }
    }

    pub fn remove_sink(&self, name: &str) -> bool {
        let mut current = self.components.sinks.write();
        match current.without(name) {
            Some(next) => {
                *current = Arc::new(next);
                debug!(sink = name, "Sink removed");
                true
            }
            None => false,
        }
    }

    pub fn transform_names(&self) -> Vec<String> {
        let chain = self.components.transforms.read().clone();
        chain.names().into_iter().map(str::to_string).collect()
    }

    pub fn sink_names(&self) -> Vec<String> {
        let sinks = self.components.sinks.read().clone();
        sinks.names().into_iter().map(str::to_string).collect()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn refresh_stats(
    queue: IngressQueue,
    stats: Arc<StatsCollector>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => stats.set_queue_depth(queue.len()),
        }
    }
}
