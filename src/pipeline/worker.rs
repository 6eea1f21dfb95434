use super::ActiveComponents;
use super::dispatch::dispatch;
use super::stats::{FlushReport, StatsCollector};
use crate::buffer::{FlushTrigger, IngressQueue, PendingBatch};
use crate::component::ChainOutcome;
use crate::domain::LogRecord;
use crate::reliability::RetryPolicy;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Everything one worker task needs. Built once per worker at start.
pub(crate) struct Worker {
    pub id: usize,
    pub queue: IngressQueue,
    pub stats: Arc<StatsCollector>,
    pub components: Arc<ActiveComponents>,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub retry: RetryPolicy,
    pub process_timeout: Duration,
    pub cancel: CancellationToken,
}

impl Worker {
    /// Pull records until cancelled or the queue closes, flushing on size, deadline and exit.
    pub async fn run(self) {
        let mut pending = PendingBatch::new(self.batch_size, self.flush_interval);
        debug!(worker_id = self.id, "Worker started");

        loop {
            let deadline = pending.deadline();

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    self.drain(&mut pending).await;
                    break;
                }

                received = self.next_record() => {
                    let Some(record) = received else {
                        self.flush(&mut pending, FlushTrigger::Shutdown).await;
                        break;
                    };
                    self.stats.record_received(self.id);
                    if pending.push(record) {
                        self.flush(&mut pending, FlushTrigger::SizeBased).await;
                    }
                }

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush(&mut pending, FlushTrigger::TimeBased).await;
                }
            }
        }

        debug!(worker_id = self.id, "Worker stopped");
    }

    async fn next_record(&self) -> Option<LogRecord> {
        let mut receiver = self.queue.lock_receiver().await;
        receiver.recv().await
    }

    /// Take the remaining backlog in batch-sized chunks, then flush whatever is left once.
    async fn drain(&self, pending: &mut PendingBatch) {
        let mut drained = 0usize;
        loop {
            let chunk = self.queue.close_and_drain(self.batch_size).await;
            if chunk.is_empty() {
                break;
            }
            drained += chunk.len();
            for record in chunk {
                self.stats.record_received(self.id);
                if pending.push(record) {
                    self.flush(pending, FlushTrigger::Shutdown).await;
                }
            }
        }

        self.flush(pending, FlushTrigger::Shutdown).await;
        if drained > 0 {
            info!(worker_id = self.id, drained, "Worker drained backlog on shutdown");
        }
    }

    async fn flush(&self, pending: &mut PendingBatch, trigger: FlushTrigger) {
        if pending.is_empty() {
            return;
        }

        let started = Instant::now();
        let batch = pending.take(trigger);
        let batch_id = batch.id();
        let (chain, sinks) = self.components.current();

        let mut report = FlushReport {
            records: batch.size(),
            ..Default::default()
        };

        let mut survivors = Vec::with_capacity(batch.size());
        for record in batch.into_records() {
            match chain.apply(record) {
                ChainOutcome::Kept(record) => survivors.push(record),
                ChainOutcome::Vetoed { by } => {
                    report.filtered += 1;
                    trace!(worker_id = self.id, %batch_id, transform = %by, "Record filtered");
                }
                ChainOutcome::Failed { by, error } => {
                    report.transform_errors += 1;
                    warn!(
                        worker_id = self.id,
                        %batch_id,
                        transform = %by,
                        error = %error,
                        "Transform failed, skipping record"
                    );
                }
            }
        }

        if !survivors.is_empty() {
            if sinks.is_empty() {
                report.errored += survivors.len();
                warn!(
                    worker_id = self.id,
                    %batch_id,
                    records = survivors.len(),
                    "No sinks registered, discarding batch"
                );
            } else {
                let records = survivors.as_slice();
                let outcomes = join_all(sinks.iter().map(|target| async move {
                    let outcome = dispatch(
                        target,
                        records,
                        self.retry,
                        self.process_timeout,
                        batch_id,
                    )
                    .await;
                    (target, outcome)
                }))
                .await;

                for (target, outcome) in outcomes {
                    report.retries += outcome.retries();
                    match outcome.result {
                        Ok(()) => report.delivered += survivors.len(),
                        Err(e) => {
                            report.errored += survivors.len();
                            report.sink_failures += 1;
                            error!(
                                worker_id = self.id,
                                %batch_id,
                                sink = %target.name,
                                attempts = outcome.attempts,
                                records = survivors.len(),
                                error = %e,
                                "Giving up on sink delivery"
                            );
                        }
                    }
                }
            }
        }

        report.duration = started.elapsed();
        self.stats.record_flush(self.id, &report);

        debug!(
            worker_id = self.id,
            %batch_id,
            trigger = ?trigger,
            records = report.records,
            delivered = report.delivered,
            filtered = report.filtered,
            errored = report.errored + report.transform_errors,
            duration_ms = report.duration.as_millis() as u64,
            "Batch flushed"
        );
    }
}
