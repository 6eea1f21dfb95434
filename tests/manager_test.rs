mod common;

use async_trait::async_trait;
use common::{BrokenSink, LevelFilter, RecordingSink, StartGateSink, record, wait_until};
use mockall::mock;
use rask_log_pipeline::component::{ComponentKind, ProducerState};
use rask_log_pipeline::reliability::{ComponentHealth, HealthStatus};
use rask_log_pipeline::{
    ComponentError, ComponentStats, IngressWriter, LogLevel, LogManager, LogRecord, ManagerError,
    PipelineConfig, PipelineError, Producer,
};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Source {}

    #[async_trait]
    impl Producer for Source {
        fn attach(&self, writer: IngressWriter);
        async fn start(&self) -> Result<(), ComponentError>;
        async fn stop(&self) -> Result<(), ComponentError>;
        fn stats(&self) -> ComponentStats;
        fn health_check(&self) -> Result<(), ComponentError>;
    }
}

/// Emits a fixed burst of records when started.
struct BurstProducer {
    state: ProducerState,
    burst: usize,
}

impl BurstProducer {
    fn new(burst: usize) -> Arc<Self> {
        Arc::new(Self {
            state: ProducerState::new(),
            burst,
        })
    }
}

#[async_trait]
impl Producer for BurstProducer {
    fn attach(&self, writer: IngressWriter) {
        self.state.attach(writer);
    }

    async fn start(&self) -> Result<(), ComponentError> {
        self.state.set_active(true);
        for i in 0..self.burst {
            self.state
                .emit(LogRecord::info(format!("burst-{i}"), ""))
                .map_err(|e| ComponentError::from(anyhow::Error::from(e)))?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ComponentError> {
        self.state.set_active(false);
        Ok(())
    }

    fn stats(&self) -> ComponentStats {
        self.state.stats()
    }

    fn health_check(&self) -> Result<(), ComponentError> {
        self.state.health_check()
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 50,
        worker_count: 2,
        batch_size: 4,
        flush_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_registry_rejects_duplicates_and_unknown_names() {
    let manager = LogManager::new(config());

    let mut first = MockSource::new();
    first.expect_attach().times(1).return_const(());
    manager.add_producer("syslog", Arc::new(first)).await.unwrap();

    let second = MockSource::new();
    let error = manager
        .add_producer("syslog", Arc::new(second))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ManagerError::AlreadyExists {
            kind: ComponentKind::Producer,
            ..
        }
    ));
    assert!(!error.is_recoverable());

    manager.add_sink("out", RecordingSink::new()).await.unwrap();
    assert!(matches!(
        manager.add_sink("out", RecordingSink::new()).await,
        Err(ManagerError::AlreadyExists {
            kind: ComponentKind::Sink,
            ..
        })
    ));

    assert!(matches!(
        manager.remove_producer("missing").await,
        Err(ManagerError::NotFound {
            kind: ComponentKind::Producer,
            ..
        })
    ));
    assert!(matches!(
        manager.remove_transform("missing").await,
        Err(ManagerError::NotFound {
            kind: ComponentKind::Transform,
            ..
        })
    ));
    assert!(matches!(
        manager.remove_sink("missing").await,
        Err(ManagerError::NotFound {
            kind: ComponentKind::Sink,
            ..
        })
    ));
}

#[tokio::test]
async fn test_lookup_and_sorted_listing() {
    let manager = LogManager::new(config());
    manager.add_sink("zeta", RecordingSink::new()).await.unwrap();
    manager.add_sink("alpha", RecordingSink::new()).await.unwrap();
    manager
        .add_transform(
            "level",
            Arc::new(LevelFilter {
                min: LogLevel::Warn,
            }),
        )
        .unwrap();

    assert_eq!(manager.sink_names(), vec!["alpha", "zeta"]);
    assert_eq!(manager.transform_names(), vec!["level"]);
    assert!(manager.producer_names().is_empty());
    assert!(manager.sink("alpha").is_some());
    assert!(manager.transform("level").is_some());
    assert!(manager.producer("alpha").is_none());

    assert_eq!(manager.pipeline().transform_names(), vec!["level"]);
    manager.remove_transform("level").await.unwrap();
    assert!(manager.pipeline().transform_names().is_empty());
}

#[tokio::test]
async fn test_removing_producer_stops_it() {
    let manager = LogManager::new(config());

    let mut source = MockSource::new();
    source.expect_attach().times(1).return_const(());
    source.expect_stop().times(1).returning(|| Ok(()));
    manager.add_producer("syslog", Arc::new(source)).await.unwrap();

    manager.remove_producer("syslog").await.unwrap();
    assert!(manager.producer("syslog").is_none());
}

#[tokio::test]
async fn test_producer_start_failure_is_reported() {
    let manager = LogManager::new(config());

    let mut source = MockSource::new();
    source.expect_attach().return_const(());
    source
        .expect_start()
        .times(1)
        .returning(|| Err(ComponentError::StartFailed("port in use".to_string())));
    source.expect_stop().returning(|| Ok(()));
    source.expect_stats().returning(ComponentStats::default);
    manager.add_producer("syslog", Arc::new(source)).await.unwrap();

    let sink = StartGateSink::refusing();
    sink.allow_start();
    manager.add_sink("out", sink.clone()).await.unwrap();

    match manager.start().await {
        Err(ManagerError::Component { kind, name, .. }) => {
            assert_eq!(kind, ComponentKind::Producer);
            assert_eq!(name, "syslog");
        }
        other => panic!("expected component failure, got {other:?}"),
    }

    // Everything started before the failure is stopped again.
    assert!(!manager.is_running());
    assert_eq!(sink.starts(), 1);
    assert_eq!(sink.stops(), 1);
    assert!(manager.stats().updated_at.is_some());
    assert!(matches!(
        manager.start().await,
        Err(ManagerError::Pipeline(PipelineError::Stopped))
    ));
    manager.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sink_start_failure_leaves_manager_restartable() {
    let manager = LogManager::new(config());
    let first = StartGateSink::refusing();
    first.allow_start();
    let second = StartGateSink::refusing();
    manager.add_sink("a_first", first.clone()).await.unwrap();
    manager.add_sink("b_second", second.clone()).await.unwrap();

    let error = manager.start().await.unwrap_err();
    assert!(matches!(
        error,
        ManagerError::Component {
            kind: ComponentKind::Sink,
            ..
        }
    ));
    assert!(!manager.is_running());
    assert_eq!(first.starts(), 1);
    assert_eq!(first.stops(), 1);
    assert_eq!(second.stops(), 0);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(manager.stats().updated_at.is_none());

    second.allow_start();
    manager.start().await.unwrap();
    assert!(manager.is_running());
    assert_eq!(first.starts(), 2);
    assert_eq!(second.starts(), 1);

    manager.stop().await.unwrap();
    assert_eq!(first.stops(), 2);
    assert_eq!(second.stops(), 1);
}

#[tokio::test]
async fn test_producer_registered_during_start_is_started_once() {
    let manager = LogManager::new(config());

    let mut source = MockSource::new();
    source.expect_attach().times(1).return_const(());
    source.expect_start().times(1).returning(|| Ok(()));
    source.expect_stop().returning(|| Ok(()));
    source.expect_stats().returning(ComponentStats::default);
    source.expect_health_check().returning(|| Ok(()));

    let (started, added) = tokio::join!(
        manager.start(),
        manager.add_producer("syslog", Arc::new(source))
    );
    started.unwrap();
    added.unwrap();

    assert_eq!(manager.producer_names(), vec!["syslog"]);
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_end_to_end_with_aggregated_stats() {
    let manager = LogManager::new(config());
    let producer = BurstProducer::new(6);
    let sink = RecordingSink::new();

    manager.add_producer("burst", producer.clone()).await.unwrap();
    manager.add_sink("recorder", sink.clone()).await.unwrap();
    manager.start().await.unwrap();
    assert!(manager.is_running());

    assert!(wait_until(Duration::from_secs(5), || sink.record_count() == 6).await);
    manager.stop().await.unwrap();
    assert!(!manager.is_running());

    let stats = manager.stats();
    assert_eq!(stats.collected, 6);
    assert_eq!(stats.producers["burst"].processed, 6);
    assert!(!stats.producers["burst"].active);
    assert_eq!(stats.sinks["recorder"].processed, 6);
    assert_eq!(stats.pipeline.accepted, 6);
    assert_eq!(stats.pipeline.delivered, 6);
    assert!(stats.updated_at.is_some());
    assert!(sink.sources().iter().all(|source| source == "burst"));

    let json = stats.to_json().unwrap();
    assert!(json.contains("\"collected\":6"));
}

#[tokio::test]
async fn test_producer_added_while_running_is_started() {
    let manager = LogManager::new(config());
    let sink = RecordingSink::new();
    manager.add_sink("recorder", sink.clone()).await.unwrap();
    manager.start().await.unwrap();

    manager
        .add_producer("late", BurstProducer::new(3))
        .await
        .unwrap();
    manager.stop().await.unwrap();

    assert_eq!(sink.record_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_background_loops_refresh_stats_and_health() {
    let manager = LogManager::new(PipelineConfig {
        stats_interval: Duration::from_secs(1),
        health_check_interval: Duration::from_secs(5),
        ..config()
    });
    manager.add_sink("broken", Arc::new(BrokenSink)).await.unwrap();
    manager.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    for i in 0..3 {
        manager.pipeline().submit(record(&format!("r{i}"))).unwrap();
    }
    assert_eq!(manager.stats().pipeline.accepted, 0);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let stats = manager.stats();
    assert!(stats.updated_at.is_some());
    assert_eq!(stats.pipeline.accepted, 3);

    // First health round fires one interval after start.
    assert!(manager.health_report().await.components.is_empty());
    tokio::time::sleep(Duration::from_secs(4)).await;
    let report = manager.health_report().await;
    assert!(report.components.contains_key("pipeline"));
    assert!(matches!(
        report.components["sink:broken"],
        ComponentHealth::Degraded(_)
    ));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let report = manager.health_report().await;
    assert!(matches!(
        report.components["sink:broken"],
        ComponentHealth::Unhealthy(_)
    ));

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_health_report_debounces_failures() {
    let manager = LogManager::new(config());
    manager.add_sink("broken", Arc::new(BrokenSink)).await.unwrap();
    manager.start().await.unwrap();

    assert!(matches!(
        manager.health_check(),
        Err(ManagerError::Component {
            kind: ComponentKind::Sink,
            ..
        })
    ));

    assert_eq!(manager.run_health_checks().await, 1);
    let report = manager.health_report().await;
    assert_eq!(report.overall_status, HealthStatus::Degraded);
    assert_eq!(report.components["pipeline"], ComponentHealth::Healthy);

    manager.run_health_checks().await;
    manager.run_health_checks().await;
    let report = manager.health_report().await;
    assert_eq!(report.overall_status, HealthStatus::Unhealthy);
    assert!(matches!(
        report.components["sink:broken"],
        ComponentHealth::Unhealthy(_)
    ));

    manager.remove_sink("broken").await.unwrap();
    let report = manager.health_report().await;
    assert_eq!(report.overall_status, HealthStatus::Healthy);
    assert!(manager.health_check().is_ok());

    manager.stop().await.unwrap();
    assert!(matches!(
        manager.health_check(),
        Err(ManagerError::PipelineUnhealthy(_))
    ));
}
