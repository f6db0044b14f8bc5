// tests/integration/storage.rs - In-memory repository behavior

use std::collections::HashMap;

use clusterpulse::alert::{Alert, AlertSeverity, AlertSource, AlertStatus};
use clusterpulse::storage::{AlertRepository, MemoryAlertRepository};

fn alert(severity: AlertSeverity, message: &str) -> Alert {
    Alert::new(
        severity,
        AlertSource::Pod,
        message,
        1.0,
        HashMap::from([("alert_type".to_string(), "pod_failed".to_string())]),
    )
}

#[tokio::test]
async fn get_recent_orders_by_trigger_time_descending() {
    let repository = MemoryAlertRepository::new();

    for i in 0..5 {
        let mut a = alert(AlertSeverity::High, &format!("alert-{i}"));
        // Spread trigger times so ordering is unambiguous.
        a.triggered_at += chrono::Duration::seconds(i);
        repository.create(&a).await.unwrap();
    }

    let recent = repository.get_recent(3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].message, "alert-4");
    assert_eq!(recent[1].message, "alert-3");
    assert_eq!(recent[2].message, "alert-2");
}

#[tokio::test]
async fn counts_split_by_status_and_severity() {
    let repository = MemoryAlertRepository::new();

    repository
        .create(&alert(AlertSeverity::Critical, "a"))
        .await
        .unwrap();
    repository
        .create(&alert(AlertSeverity::Critical, "b"))
        .await
        .unwrap();
    repository
        .create(&alert(AlertSeverity::Medium, "c"))
        .await
        .unwrap();

    // A resolved critical alert must not count towards firing severities.
    let mut resolved = alert(AlertSeverity::Critical, "d");
    resolved.resolve();
    repository.create(&resolved).await.unwrap();

    assert_eq!(repository.count().await.unwrap(), 4);
    assert_eq!(
        repository
            .count_by_status(AlertStatus::Firing)
            .await
            .unwrap(),
        3
    );
    assert_eq!(
        repository
            .count_by_status(AlertStatus::Resolved)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        repository
            .count_by_severity(AlertSeverity::Critical)
            .await
            .unwrap(),
        2
    );
    assert_eq!(
        repository
            .count_by_severity(AlertSeverity::Low)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn limit_larger_than_contents_returns_everything() {
    let repository = MemoryAlertRepository::new();
    repository
        .create(&alert(AlertSeverity::Low, "only"))
        .await
        .unwrap();

    let recent = repository.get_recent(100).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].message, "only");
}
