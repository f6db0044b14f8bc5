// tests/integration/watcher.rs - Watcher reconnect and metrics sampling

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Node, Pod};

use clusterpulse::bus::EventBus;
use clusterpulse::error::MonitorError;
use clusterpulse::observe::{WatchEvent, WatchEventKind};
use clusterpulse::pool::WorkerPool;
use clusterpulse::rules::Thresholds;
use clusterpulse::state::AlertStateManager;
use clusterpulse::storage::{AlertRepository, MemoryAlertRepository};
use clusterpulse::watch::{MetricsWatcher, NodeWatcher, PodWatcher};

use crate::helpers::test_data::{
    failed_pod, hot_pod_usage, idle_node_usage, not_ready_node,
};
use crate::helpers::{channel_stream, closed_stream, wait_until, ScriptedObserver};

fn thresholds() -> Thresholds {
    Thresholds::from(&clusterpulse::Config::default().alert_rules)
}

struct Fixture {
    repository: Arc<MemoryAlertRepository>,
    state_manager: Arc<AlertStateManager>,
    pool: Arc<WorkerPool>,
}

async fn fixture() -> Fixture {
    let repository = Arc::new(MemoryAlertRepository::new());
    let state_manager = Arc::new(AlertStateManager::new(
        repository.clone(),
        Arc::new(EventBus::new()),
    ));
    let pool = Arc::new(WorkerPool::new(2, 32));
    pool.start().await;
    Fixture {
        repository,
        state_manager,
        pool,
    }
}

/// Property: a failed dial is retried after the backoff, and the watcher is
/// streaming again afterwards. Paused time makes the 5 s backoff instant.
#[tokio::test(start_paused = true)]
async fn pod_watcher_reconnects_after_dial_failure() {
    let observer = Arc::new(ScriptedObserver::new());
    observer.push_pod_stream(Err(MonitorError::Upstream("apiserver down".to_string())));
    let (events_tx, stream) = channel_stream::<Pod>();
    observer.push_pod_stream(Ok(stream));

    let f = fixture().await;
    let watcher = PodWatcher::new(
        observer.clone(),
        f.state_manager.clone(),
        f.pool.clone(),
        thresholds(),
    );
    watcher.start().await;

    wait_until("the watch to be re-dialed", || {
        let observer = observer.clone();
        async move { observer.pod_watch_calls.load(Ordering::SeqCst) >= 2 }
    })
    .await;

    events_tx
        .send(Ok(WatchEvent {
            kind: WatchEventKind::Added,
            object: failed_pod("default", "dead-1"),
        }))
        .await
        .unwrap();

    wait_until("the alert to persist", || {
        let repository = f.repository.clone();
        async move { repository.count().await.unwrap() >= 1 }
    })
    .await;

    let alerts = f.repository.get_recent(5).await.unwrap();
    assert_eq!(alerts[0].labels["alert_type"], "pod_failed");
    assert_eq!(alerts[0].labels["pod"], "dead-1");

    watcher.stop().await;
    watcher.stop().await; // idempotent
    f.pool.stop().await;
}

/// Property: a stream that ends moves the watcher back through Disconnected
/// and into Streaming on the next open.
#[tokio::test(start_paused = true)]
async fn pod_watcher_reopens_a_closed_stream() {
    let observer = Arc::new(ScriptedObserver::new());
    observer.push_pod_stream(Ok(closed_stream()));
    let (events_tx, stream) = channel_stream::<Pod>();
    observer.push_pod_stream(Ok(stream));

    let f = fixture().await;
    let watcher = PodWatcher::new(
        observer.clone(),
        f.state_manager.clone(),
        f.pool.clone(),
        thresholds(),
    );
    watcher.start().await;

    wait_until("the watch to be reopened", || {
        let observer = observer.clone();
        async move { observer.pod_watch_calls.load(Ordering::SeqCst) >= 2 }
    })
    .await;

    events_tx
        .send(Ok(WatchEvent {
            kind: WatchEventKind::Modified,
            object: failed_pod("default", "dead-2"),
        }))
        .await
        .unwrap();

    wait_until("the alert to persist", || {
        let repository = f.repository.clone();
        async move { repository.count().await.unwrap() >= 1 }
    })
    .await;

    watcher.stop().await;
    f.pool.stop().await;
}

#[tokio::test(start_paused = true)]
async fn node_watcher_turns_conditions_into_alerts() {
    let observer = Arc::new(ScriptedObserver::new());
    let (events_tx, stream) = channel_stream::<Node>();
    observer.push_node_stream(Ok(stream));

    let f = fixture().await;
    let watcher = NodeWatcher::new(observer.clone(), f.state_manager.clone(), f.pool.clone());
    watcher.start().await;

    events_tx
        .send(Ok(WatchEvent {
            kind: WatchEventKind::Modified,
            object: not_ready_node("n1"),
        }))
        .await
        .unwrap();

    wait_until("the node alert to persist", || {
        let repository = f.repository.clone();
        async move { repository.count().await.unwrap() >= 1 }
    })
    .await;

    let alerts = f.repository.get_recent(5).await.unwrap();
    assert_eq!(alerts[0].labels["alert_type"], "node_not_ready");
    assert_eq!(alerts[0].labels["node"], "n1");

    watcher.stop().await;
    f.pool.stop().await;
}

/// The metrics watcher samples immediately at start and again every interval.
#[tokio::test(start_paused = true)]
async fn metrics_watcher_samples_now_and_periodically() {
    let observer = Arc::new(ScriptedObserver::with_usages(
        vec![hot_pod_usage("a", "b")],
        vec![idle_node_usage("n1")],
    ));

    let f = fixture().await;
    let watcher = MetricsWatcher::new(
        observer,
        f.state_manager.clone(),
        f.pool.clone(),
        thresholds(),
        Duration::from_secs(60),
    );
    watcher.start().await;

    // Immediate sample: the hot pod alerts, the idle node does not.
    wait_until("the first sample to land", || {
        let repository = f.repository.clone();
        async move { repository.count().await.unwrap() >= 1 }
    })
    .await;

    let alerts = f.repository.get_recent(5).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].labels["alert_type"], "pod_cpu_high");
    assert_eq!(alerts[0].labels["metric"], "cpu");
    assert!((alerts[0].value - 90.0).abs() < 0.001);

    // Next interval fires a second, identical (but distinct) alert.
    tokio::time::sleep(Duration::from_secs(61)).await;
    wait_until("the second sample to land", || {
        let repository = f.repository.clone();
        async move { repository.count().await.unwrap() >= 2 }
    })
    .await;

    let alerts = f.repository.get_recent(5).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_ne!(alerts[0].id, alerts[1].id);

    watcher.stop().await;
    f.pool.stop().await;
}
