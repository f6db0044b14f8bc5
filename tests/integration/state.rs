// tests/integration/state.rs - Persist-then-publish contract

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clusterpulse::alert::{Alert, AlertSeverity, AlertSource};
use clusterpulse::bus::EventBus;
use clusterpulse::error::MonitorError;
use clusterpulse::state::AlertStateManager;
use clusterpulse::storage::{AlertRepository, MemoryAlertRepository};

use crate::helpers::{wait_until, FailingRepository, RecordingSink};

fn alert() -> Alert {
    Alert::new(
        AlertSeverity::Critical,
        AlertSource::Pod,
        "pod exploded",
        1.0,
        HashMap::from([("alert_type".to_string(), "pod_failed".to_string())]),
    )
}

fn pipeline(
    repository: Arc<dyn AlertRepository>,
) -> (AlertStateManager, Arc<RecordingSink>, Arc<EventBus>) {
    let recording = Arc::new(RecordingSink::new());
    let mut bus = EventBus::new();
    bus.subscribe(recording.clone());
    let bus = Arc::new(bus);
    (
        AlertStateManager::new(repository, bus.clone()),
        recording,
        bus,
    )
}

/// An alert appears on the bus iff persistence succeeded.
#[tokio::test]
async fn successful_persist_publishes_exactly_once() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let (manager, recording, bus) = pipeline(repository.clone());
    bus.start().await;

    let created = manager.process_alert(alert()).await.unwrap();
    assert!(created);
    assert_eq!(repository.count().await.unwrap(), 1);

    wait_until("the event to reach the sink", || {
        let recording = recording.clone();
        async move { recording.event_count().await == 1 }
    })
    .await;

    bus.stop().await;
}

#[tokio::test]
async fn persist_failure_suppresses_publication() {
    let (manager, recording, bus) = pipeline(Arc::new(FailingRepository));
    bus.start().await;

    let err = manager.process_alert(alert()).await.unwrap_err();
    assert!(matches!(err, MonitorError::Persist(_)));

    // Give the dispatcher a beat: nothing may come through.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recording.event_count().await, 0);

    bus.stop().await;
}

/// No deduplication: identical conditions stay distinct records.
#[tokio::test]
async fn repeated_identical_alerts_all_persist() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let (manager, recording, bus) = pipeline(repository.clone());
    bus.start().await;

    for _ in 0..3 {
        manager.process_alert(alert()).await.unwrap();
    }

    assert_eq!(repository.count().await.unwrap(), 3);
    let recent = repository.get_recent(10).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert_ne!(recent[0].id, recent[1].id);
    assert_ne!(recent[1].id, recent[2].id);

    wait_until("all three events on the bus", || {
        let recording = recording.clone();
        async move { recording.event_count().await == 3 }
    })
    .await;

    bus.stop().await;
}
