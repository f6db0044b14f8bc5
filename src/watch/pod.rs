// src/watch/pod.rs - Pod watcher: watch stream -> event channel -> worker pool

use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::observe::{ClusterObserver, PodEvent};
use crate::pool::{Task, WorkerPool};
use crate::rules::{self, Thresholds};
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::state::AlertStateManager;

use super::{POD_EVENT_CHANNEL_CAPACITY, RECONNECT_DELAY};

/// Watches every pod in the cluster and turns interesting state changes into
/// alert-processing tasks. The watch scope and the dispatcher scope are
/// independent; a burst of events never stalls the watch.
pub struct PodWatcher {
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    pool: Arc<WorkerPool>,
    thresholds: Thresholds,
    event_tx: mpsc::Sender<PodEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<PodEvent>>>,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PodWatcher {
    pub fn new(
        observer: Arc<dyn ClusterObserver>,
        state_manager: Arc<AlertStateManager>,
        pool: Arc<WorkerPool>,
        thresholds: Thresholds,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(POD_EVENT_CHANNEL_CAPACITY);
        Self {
            observer,
            state_manager,
            pool,
            thresholds,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the dispatcher and watch scopes.
    pub async fn start(&self) {
        info!("Starting pod watcher");

        let Some(event_rx) = self.event_rx.lock().await.take() else {
            warn!("Pod watcher already started");
            return;
        };

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(dispatch_loop(
            event_rx,
            self.pool.clone(),
            self.state_manager.clone(),
            self.thresholds.clone(),
            self.shutdown.signal(),
        )));
        tasks.push(tokio::spawn(watch_loop(
            self.observer.clone(),
            self.event_tx.clone(),
            self.shutdown.signal(),
        )));
    }

    /// Stop both scopes and wait for them to join. Safe to call twice.
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
        info!("Pod watcher stopped");
    }
}

/// Keep a watch open against the cluster, reconnecting after failures, and
/// push typed events onto the bounded channel without ever blocking.
async fn watch_loop(
    observer: Arc<dyn ClusterObserver>,
    event_tx: mpsc::Sender<PodEvent>,
    signal: ShutdownSignal,
) {
    let mut stop = signal.clone();

    loop {
        if stop.is_triggered() {
            return;
        }

        match observer.watch_pods().await {
            Ok(mut stream) => {
                info!("Pod watcher connected to Kubernetes API");

                loop {
                    tokio::select! {
                        biased;
                        _ = stop.triggered() => return,
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                let pod_event = PodEvent {
                                    kind: event.kind,
                                    pod: event.object,
                                    observed_at: Utc::now(),
                                };
                                match event_tx.try_send(pod_event) {
                                    Ok(()) => {}
                                    Err(mpsc::error::TrySendError::Full(_)) => {
                                        warn!("Pod event channel full, dropping event");
                                    }
                                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                                }
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "Pod watch stream error, reconnecting");
                                break;
                            }
                            None => {
                                warn!("Pod watch stream closed, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Failed to open pod watch, retrying in 5s");
                tokio::select! {
                    biased;
                    _ = stop.triggered() => return,
                    _ = sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }
}

/// Drain the event channel and hand each event to the worker pool. A full
/// pool queue drops the event; ingestion never blocks on evaluation.
async fn dispatch_loop(
    mut event_rx: mpsc::Receiver<PodEvent>,
    pool: Arc<WorkerPool>,
    state_manager: Arc<AlertStateManager>,
    thresholds: Thresholds,
    signal: ShutdownSignal,
) {
    let mut stop = signal.clone();

    loop {
        tokio::select! {
            biased;
            _ = stop.triggered() => {
                info!("Pod event dispatcher stopped");
                return;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { return };

                let namespace = event.pod.metadata.namespace.clone().unwrap_or_default();
                let name = event.pod.metadata.name.clone().unwrap_or_default();

                let task: Task = Box::pin(process_pod_event(
                    state_manager.clone(),
                    thresholds.clone(),
                    event,
                ));

                if let Err(err) = pool.submit_with_signal(&signal, task) {
                    warn!(
                        pod = %name,
                        namespace = %namespace,
                        error = %err,
                        "Failed to submit pod event to worker pool"
                    );
                }
            }
        }
    }
}

async fn process_pod_event(
    state_manager: Arc<AlertStateManager>,
    thresholds: Thresholds,
    event: PodEvent,
) -> Result<()> {
    let pod = event.pod;

    debug!(
        kind = ?event.kind,
        pod = pod.metadata.name.as_deref().unwrap_or_default(),
        namespace = pod.metadata.namespace.as_deref().unwrap_or_default(),
        "Processing pod event"
    );

    for alert in rules::evaluate_pod(&pod, &thresholds, event.observed_at) {
        let alert_type = alert.alert_type().to_string();
        if let Err(err) = state_manager.process_alert(alert).await {
            error!(
                pod = pod.metadata.name.as_deref().unwrap_or_default(),
                alert_type = %alert_type,
                error = %err,
                "Failed to process alert"
            );
        }
    }

    Ok(())
}
