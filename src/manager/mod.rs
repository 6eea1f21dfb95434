//! Registry and supervisor around a [`Pipeline`].
//!
//! The manager owns the named producers, transforms and sinks, wires them into the pipeline,
//! starts and stops them together with it, and runs two background loops: one aggregating
//! statistics every `stats_interval`, one evaluating health every `health_check_interval`.

mod error;
mod registry;
mod stats;

pub use error::ManagerError;
pub use stats::ManagerStats;

use crate::app::PipelineConfig;
use crate::component::{ComponentKind, Producer, Sink, Transform};
use crate::domain::PipelineError;
use crate::pipeline::Pipeline;
use crate::reliability::{HealthConfig, HealthMonitor, HealthReport};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PIPELINE_COMPONENT: &str = "pipeline";

pub struct LogManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    pipeline: Pipeline,
    registry: RwLock<Registry>,
    stats: RwLock<ManagerStats>,
    monitor: HealthMonitor,
    /// Serializes start, stop and registration so a component is started at most once.
    lifecycle: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    created_at: Instant,
}

fn health_key(kind: ComponentKind, name: &str) -> String {
    format!("{kind}:{name}")
}

async fn stop_producers(producers: &[(String, Arc<dyn Producer>)]) {
    for (name, producer) in producers {
        if let Err(e) = producer.stop().await {
            warn!(producer = %name, error = %e, "Producer failed to stop");
        }
    }
}

async fn stop_sinks(sinks: &[(String, Arc<dyn Sink>)]) {
    for (name, sink) in sinks {
        if let Err(e) = sink.stop().await {
            warn!(sink = %name, error = %e, "Sink failed to stop");
        }
    }
}

impl LogManager {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_pipeline(Pipeline::new(config))
    }

    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                pipeline,
                registry: RwLock::new(Registry::new()),
                stats: RwLock::new(ManagerStats::default()),
                monitor: HealthMonitor::new(HealthConfig::default()),
                lifecycle: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
                created_at: Instant::now(),
            }),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn is_running(&self) -> bool {
        self.inner.pipeline.is_running()
    }

    /// Start every registered sink, then the pipeline, then every producer, then the
    /// background loops.
    ///
    /// A failure stops whatever was already started. A sink failure happens before the pipeline
    /// starts, so `start` can be retried; a producer failure leaves the pipeline stopped.
    pub async fn start(&self) -> Result<(), ManagerError> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        if inner.pipeline.is_running() {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let (sinks, producers) = {
            let registry = inner.registry.read();
            (registry.sinks.entries(), registry.producers.entries())
        };

        let mut started_sinks = Vec::with_capacity(sinks.len());
        for (name, sink) in sinks {
            if let Err(e) = sink.start().await {
                stop_sinks(&started_sinks).await;
                return Err(ManagerError::component(ComponentKind::Sink, &name, e));
            }
            started_sinks.push((name, sink));
        }

        if let Err(e) = inner.pipeline.start().await {
            stop_sinks(&started_sinks).await;
            return Err(e.into());
        }

        let mut started_producers = Vec::with_capacity(producers.len());
        for (name, producer) in producers {
            if let Err(e) = producer.start().await {
                warn!(producer = %name, error = %e, "Producer failed to start, rolling back");
                stop_producers(&started_producers).await;
                if let Err(stop_error) = inner.pipeline.stop().await {
                    warn!(error = %stop_error, "Pipeline failed to stop during rollback");
                }
                stop_sinks(&started_sinks).await;
                inner.refresh_stats();
                return Err(ManagerError::component(ComponentKind::Producer, &name, e));
            }
            started_producers.push((name, producer));
        }

        let config = inner.pipeline.config();
        let handles = vec![
            tokio::spawn(ManagerInner::stats_loop(
                inner.clone(),
                config.stats_interval,
            )),
            tokio::spawn(ManagerInner::health_loop(
                inner.clone(),
                config.health_check_interval,
            )),
        ];
        *inner.tasks.lock() = handles;

        info!(
            producers = started_producers.len(),
            transforms = self.transform_names().len(),
            sinks = started_sinks.len(),
            "Log manager started"
        );
        Ok(())
    }

    /// Stop producers, drain the pipeline, then stop sinks.
    ///
    /// Component stop failures are logged; only a pipeline failure is returned.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;
        inner.cancel.cancel();
        let handles = std::mem::take(&mut *inner.tasks.lock());
        join_all(handles).await;

        let (producers, sinks) = {
            let registry = inner.registry.read();
            (registry.producers.entries(), registry.sinks.entries())
        };

        stop_producers(&producers).await;
        let result = inner.pipeline.stop().await;
        stop_sinks(&sinks).await;

        inner.refresh_stats();
        info!("Log manager stopped");
        result.map_err(ManagerError::from)
    }

    /// Register a producer and hand it a writer bound to `name`. A producer added while the
    /// manager is running is started immediately.
    pub async fn add_producer(
        &self,
        name: &str,
        producer: Arc<dyn Producer>,
    ) -> Result<(), ManagerError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        {
            let mut registry = self.inner.registry.write();
            registry.producers.ensure_absent(name)?;
            producer.attach(self.inner.pipeline.writer(name));
            registry.producers.insert(name, producer.clone())?;
        }

        if self.is_running() {
            if let Err(e) = producer.start().await {
                let _ = self.inner.registry.write().producers.remove(name);
                return Err(ManagerError::component(ComponentKind::Producer, name, e));
            }
        }

        debug!(producer = name, "Producer registered");
        Ok(())
    }

    /// Unregister a producer and stop it.
    pub async fn remove_producer(&self, name: &str) -> Result<(), ManagerError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let producer = self.inner.registry.write().producers.remove(name)?;
        self.inner
            .monitor
            .forget(&health_key(ComponentKind::Producer, name))
            .await;

        if let Err(e) = producer.stop().await {
            warn!(producer = name, error = %e, "Producer failed to stop on removal");
        }
        debug!(producer = name, "Producer removed");
        Ok(())
    }

    /// Append a transform to the end of the pipeline's chain.
    pub fn add_transform(
        &self,
        name: &str,
        transform: Arc<dyn Transform>,
    ) -> Result<(), ManagerError> {
        let mut registry = self.inner.registry.write();
        registry.transforms.ensure_absent(name)?;
        if !self.inner.pipeline.add_transform(name, transform.clone()) {
            return Err(ManagerError::AlreadyExists {
                kind: ComponentKind::Transform,
                name: name.to_string(),
            });
        }
        registry.transforms.insert(name, transform)
    }

    pub async fn remove_transform(&self, name: &str) -> Result<(), ManagerError> {
        {
            let mut registry = self.inner.registry.write();
            registry.transforms.remove(name)?;
            self.inner.pipeline.remove_transform(name);
        }
        self.inner
            .monitor
            .forget(&health_key(ComponentKind::Transform, name))
            .await;
        Ok(())
    }

    /// Register a sink. A sink added while the manager is running is started before it
    /// receives its first batch.
    pub async fn add_sink(&self, name: &str, sink: Arc<dyn Sink>) -> Result<(), ManagerError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.registry.read().sinks.ensure_absent(name)?;

        let started = self.is_running();
        if started {
            sink.start()
                .await
                .map_err(|e| ManagerError::component(ComponentKind::Sink, name, e))?;
        }

        let registered = {
            let mut registry = self.inner.registry.write();
            registry.sinks.insert(name, sink.clone()).map(|()| {
                self.inner.pipeline.add_sink(name, sink.clone());
            })
        };

        if let Err(e) = registered {
            if started {
                if let Err(stop_error) = sink.stop().await {
                    warn!(sink = name, error = %stop_error, "Rejected sink failed to stop");
                }
            }
            return Err(e);
        }

        debug!(sink = name, "Sink registered");
        Ok(())
    }

    /// Unregister a sink and stop it. Batches already being dispatched still reach it.
    pub async fn remove_sink(&self, name: &str) -> Result<(), ManagerError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let sink = {
            let mut registry = self.inner.registry.write();
            let sink = registry.sinks.remove(name)?;
            self.inner.pipeline.remove_sink(name);
            sink
        };
        self.inner
            .monitor
            .forget(&health_key(ComponentKind::Sink, name))
            .await;

        if let Err(e) = sink.stop().await {
            warn!(sink = name, error = %e, "Sink failed to stop on removal");
        }
        debug!(sink = name, "Sink removed");
        Ok(())
    }

    pub fn producer(&self, name: &str) -> Option<Arc<dyn Producer>> {
        self.inner.registry.read().producers.get(name)
    }

    pub fn transform(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.inner.registry.read().transforms.get(name)
    }

    pub fn sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.inner.registry.read().sinks.get(name)
    }

    pub fn producer_names(&self) -> Vec<String> {
        self.inner.registry.read().producers.names()
    }

    pub fn transform_names(&self) -> Vec<String> {
        self.inner.registry.read().transforms.names()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.inner.registry.read().sinks.names()
    }

    /// Statistics as of the last refresh (background loop or explicit call).
    pub fn stats(&self) -> ManagerStats {
        self.inner.stats.read().clone()
    }

    /// Pull fresh statistics from the pipeline and every component.
    pub fn refresh_stats(&self) -> ManagerStats {
        self.inner.refresh_stats()
    }

    /// First failing health check across the pipeline and every component.
    pub fn health_check(&self) -> Result<(), ManagerError> {
        let inner = &self.inner;
        inner.pipeline.health_check()?;

        let registry = inner.registry.read();
        for (name, producer) in registry.producers.entries() {
            producer
                .health_check()
                .map_err(|e| ManagerError::component(ComponentKind::Producer, &name, e))?;
        }
        for (name, transform) in registry.transforms.entries() {
            transform
                .health_check()
                .map_err(|e| ManagerError::component(ComponentKind::Transform, &name, e))?;
        }
        for (name, sink) in registry.sinks.entries() {
            sink.health_check()
                .map_err(|e| ManagerError::component(ComponentKind::Sink, &name, e))?;
        }
        Ok(())
    }

    /// Check everything once and feed the results to the health monitor. Returns the number of
    /// failing checks.
    pub async fn run_health_checks(&self) -> usize {
        self.inner.run_health_checks().await
    }

    /// Debounced health derived from the checks recorded so far.
    pub async fn health_report(&self) -> HealthReport {
        HealthReport::generate(&self.inner.monitor, self.inner.created_at).await
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl ManagerInner {
    fn refresh_stats(&self) -> ManagerStats {
        let pipeline = self.pipeline.snapshot();
        let (producers, transforms, sinks) = {
            let registry = self.registry.read();
            (
                registry.producers.entries(),
                registry.transforms.entries(),
                registry.sinks.entries(),
            )
        };

        let producers: std::collections::BTreeMap<_, _> = producers
            .into_iter()
            .map(|(name, producer)| (name, producer.stats()))
            .collect();
        let collected = producers.values().map(|stats| stats.processed).sum();

        let stats = ManagerStats {
            pipeline,
            collected,
            producers,
            transforms: transforms
                .into_iter()
                .map(|(name, transform)| (name, transform.stats()))
                .collect(),
            sinks: sinks
                .into_iter()
                .map(|(name, sink)| (name, sink.stats()))
                .collect(),
            updated_at: Some(Utc::now()),
        };

        *self.stats.write() = stats.clone();
        stats
    }

    async fn run_health_checks(&self) -> usize {
        let mut results = vec![(
            PIPELINE_COMPONENT.to_string(),
            self.pipeline.health_check().map_err(|e| e.to_string()),
        )];

        {
            let registry = self.registry.read();
            for (name, producer) in registry.producers.entries() {
                let result = producer.health_check().map_err(|e| e.to_string());
                results.push((health_key(ComponentKind::Producer, &name), result));
            }
            for (name, transform) in registry.transforms.entries() {
                let result = transform.health_check().map_err(|e| e.to_string());
                results.push((health_key(ComponentKind::Transform, &name), result));
            }
            for (name, sink) in registry.sinks.entries() {
                let result = sink.health_check().map_err(|e| e.to_string());
                results.push((health_key(ComponentKind::Sink, &name), result));
            }
        }

        let mut failures = 0;
        for (component, result) in results {
            if let Err(reason) = &result {
                failures += 1;
                warn!(component = %component, reason = %reason, "Health check failed");
            }
            self.monitor.record_health_check(&component, result).await;
        }
        failures
    }

    async fn stats_loop(inner: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    inner.refresh_stats();
                }
            }
        }
    }

    async fn health_loop(inner: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = inner.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let failures = inner.run_health_checks().await;
                    if failures > 0 {
                        debug!(failures, "Health round completed with failures");
                    }
                }
            }
        }
    }
}
