// tests/integration/rules.rs - End-to-end rule scenarios through the
// state manager

use std::sync::Arc;

use chrono::Utc;

use clusterpulse::alert::{AlertSeverity, AlertSource};
use clusterpulse::bus::EventBus;
use clusterpulse::rules::{self, Thresholds};
use clusterpulse::state::AlertStateManager;
use clusterpulse::storage::{AlertRepository, MemoryAlertRepository};

use crate::helpers::test_data;

fn thresholds() -> Thresholds {
    Thresholds::from(&clusterpulse::Config::default().alert_rules)
}

fn manager(repository: Arc<MemoryAlertRepository>) -> AlertStateManager {
    // Bus without sinks: publication is exercised, fan-out is not the
    // subject here.
    AlertStateManager::new(repository, Arc::new(EventBus::new()))
}

/// Scenario S1: one OOM-killed container yields one critical alert with the
/// container label and the restart count as value.
#[tokio::test]
async fn oom_killed_pod_end_to_end() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let manager = manager(repository.clone());

    let pod = test_data::oom_pod("prod", "web-7", "app", 4);
    for alert in rules::evaluate_pod(&pod, &thresholds(), Utc::now()) {
        manager.process_alert(alert).await.unwrap();
    }

    let alerts = repository.get_recent(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(alert.source, AlertSource::Pod);
    assert_eq!(alert.labels["alert_type"], "pod_oom_killed");
    assert_eq!(alert.labels["namespace"], "prod");
    assert_eq!(alert.labels["pod"], "web-7");
    assert_eq!(alert.labels["container"], "app");
    assert_eq!(alert.value, 4.0);
    assert!(alert.message.contains("OOM KILLED"));
    assert!(alert.message.contains("app"));
}

/// Scenario S3: a not-ready node yields one critical node alert.
#[tokio::test]
async fn not_ready_node_end_to_end() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let manager = manager(repository.clone());

    for alert in rules::evaluate_node(&test_data::not_ready_node("n1")) {
        manager.process_alert(alert).await.unwrap();
    }

    let alerts = repository.get_recent(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert_eq!(alerts[0].source, AlertSource::Node);
    assert_eq!(alerts[0].labels["alert_type"], "node_not_ready");
    assert_eq!(alerts[0].labels["node"], "n1");
}

/// Scenario S4: pod at 90% CPU of its request crosses an 80% threshold.
#[tokio::test]
async fn pod_cpu_threshold_end_to_end() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let manager = manager(repository.clone());

    let usage = test_data::hot_pod_usage("a", "b");
    for alert in rules::evaluate_pod_usage(&usage, &thresholds()) {
        manager.process_alert(alert).await.unwrap();
    }

    let alerts = repository.get_recent(10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.severity, AlertSeverity::High);
    assert_eq!(alert.source, AlertSource::PodMetrics);
    assert_eq!(alert.labels["metric"], "cpu");
    assert!((alert.value - 90.0).abs() < 0.001);
}

/// Feeding the same pod event k times yields exactly k alerts per matched
/// condition, each with a distinct id.
#[tokio::test]
async fn replayed_events_are_never_deduplicated() {
    let repository = Arc::new(MemoryAlertRepository::new());
    let manager = manager(repository.clone());

    let pod = test_data::crash_loop_pod("default", "worker-1", "main", 2);
    let t = thresholds();

    for _ in 0..4 {
        for alert in rules::evaluate_pod(&pod, &t, Utc::now()) {
            manager.process_alert(alert).await.unwrap();
        }
    }

    // One matched condition (crash loop), four replays.
    assert_eq!(repository.count().await.unwrap(), 4);

    let alerts = repository.get_recent(10).await.unwrap();
    let mut ids: Vec<_> = alerts.iter().map(|a| a.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert!(alerts
        .iter()
        .all(|a| a.labels["alert_type"] == "pod_crash_loop"));
}
