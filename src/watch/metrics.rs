// src/watch/metrics.rs - Periodic metrics sampling against thresholds

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::observe::ClusterObserver;
use crate::pool::{Task, WorkerPool};
use crate::rules::{self, Thresholds};
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::state::AlertStateManager;

/// Samples the metrics API on a timer and submits one pod task and one node
/// task per tick. The first sample runs immediately at start.
pub struct MetricsWatcher {
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    pool: Arc<WorkerPool>,
    thresholds: Thresholds,
    interval: Duration,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MetricsWatcher {
    pub fn new(
        observer: Arc<dyn ClusterObserver>,
        state_manager: Arc<AlertStateManager>,
        pool: Arc<WorkerPool>,
        thresholds: Thresholds,
        sample_interval: Duration,
    ) -> Self {
        Self {
            observer,
            state_manager,
            pool,
            thresholds,
            interval: sample_interval,
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub async fn start(&self) {
        info!(interval = ?self.interval, "Starting metrics watcher");

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(metrics_loop(
            self.observer.clone(),
            self.state_manager.clone(),
            self.pool.clone(),
            self.thresholds.clone(),
            self.interval,
            self.shutdown.signal(),
        )));
    }

    pub async fn stop(&self) {
        {
            let mut stopped = self.stopped.lock().unwrap();
            if *stopped {
                return;
            }
            *stopped = true;
        }

        self.shutdown.trigger();
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }
        info!("Metrics watcher stopped");
    }
}

async fn metrics_loop(
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    pool: Arc<WorkerPool>,
    thresholds: Thresholds,
    sample_interval: Duration,
    signal: ShutdownSignal,
) {
    let mut stop = signal.clone();
    // The first tick fires immediately, so an initial sample runs at start.
    let mut ticker = interval(sample_interval);

    loop {
        tokio::select! {
            biased;
            _ = stop.triggered() => {
                info!("Metrics watcher loop stopped");
                return;
            }
            _ = ticker.tick() => {
                submit_checks(&observer, &state_manager, &pool, &thresholds, &signal);
            }
        }
    }
}

/// Submit the pod and node snapshot checks for one tick.
fn submit_checks(
    observer: &Arc<dyn ClusterObserver>,
    state_manager: &Arc<AlertStateManager>,
    pool: &Arc<WorkerPool>,
    thresholds: &Thresholds,
    signal: &ShutdownSignal,
) {
    let pod_task: Task = Box::pin(check_pod_metrics(
        observer.clone(),
        state_manager.clone(),
        thresholds.clone(),
    ));
    if let Err(err) = pool.submit_with_signal(signal, pod_task) {
        warn!(error = %err, "Failed to submit pod metrics check");
    }

    let node_task: Task = Box::pin(check_node_metrics(
        observer.clone(),
        state_manager.clone(),
        thresholds.clone(),
    ));
    if let Err(err) = pool.submit_with_signal(signal, node_task) {
        warn!(error = %err, "Failed to submit node metrics check");
    }
}

async fn check_pod_metrics(
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    thresholds: Thresholds,
) -> Result<()> {
    let snapshots = observer.list_pod_metrics().await.map_err(|err| {
        error!(error = %err, "Failed to list pod metrics");
        err
    })?;

    info!(pod_count = snapshots.len(), "Checking pod metrics");

    for usage in &snapshots {
        for alert in rules::evaluate_pod_usage(usage, &thresholds) {
            if let Err(err) = state_manager.process_alert(alert).await {
                error!(
                    pod = %usage.name,
                    namespace = %usage.namespace,
                    error = %err,
                    "Failed to create pod metric alert"
                );
            }
        }
    }

    Ok(())
}

async fn check_node_metrics(
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    thresholds: Thresholds,
) -> Result<()> {
    let snapshots = observer.list_node_metrics().await.map_err(|err| {
        error!(error = %err, "Failed to list node metrics");
        err
    })?;

    info!(node_count = snapshots.len(), "Checking node metrics");

    for usage in &snapshots {
        for alert in rules::evaluate_node_usage(usage, &thresholds) {
            if let Err(err) = state_manager.process_alert(alert).await {
                error!(
                    node = %usage.name,
                    error = %err,
                    "Failed to create node metric alert"
                );
            }
        }
    }

    Ok(())
}
