// src/watch/node.rs - Node watcher, same shape as the pod watcher

use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::observe::{ClusterObserver, NodeEvent};
use crate::pool::{Task, WorkerPool};
use crate::rules;
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::state::AlertStateManager;

use super::{NODE_EVENT_CHANNEL_CAPACITY, RECONNECT_DELAY};

/// Watches every node in the cluster and feeds condition changes into the
/// worker pool.
pub struct NodeWatcher {
    observer: Arc<dyn ClusterObserver>,
    state_manager: Arc<AlertStateManager>,
    pool: Arc<WorkerPool>,
    event_tx: mpsc::Sender<NodeEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<NodeEvent>>>,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeWatcher {
    pub fn new(
        observer: Arc<dyn ClusterObserver>,
        state_manager: Arc<AlertStateManager>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(NODE_EVENT_CHANNEL_CAPACITY);
        Self {
            observer,
            state_manager,
            pool,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub async fn start(&self) {
        info!("Starting node watcher");

        let Some(event_rx) = self.event_rx.lock().await.take() else {
            warn!("Node watcher already started");
            return;
        };

        let mut tasks = self.tasks.lock().await;
        tasks.push(tokio::spawn(dispatch_loop(
            event_rx,
            self.pool.clone(),
            self.state_manager.clone(),
            self.shutdown.signal(),
        )));
        tasks.push(tokio::spawn(watch_loop(
            self.observer.clone(),
            self.event_tx.clone(),
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
        info!("Node watcher stopped");
    }
}

async fn watch_loop(
    observer: Arc<dyn ClusterObserver>,
    event_tx: mpsc::Sender<NodeEvent>,
    signal: ShutdownSignal,
) {
    let mut stop = signal.clone();

    loop {
        if stop.is_triggered() {
            return;
        }

        match observer.watch_nodes().await {
            Ok(mut stream) => {
                info!("Node watcher connected to Kubernetes API");

                loop {
                    tokio::select! {
                        biased;
                        _ = stop.triggered() => return,
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                let node_event = NodeEvent {
                                    kind: event.kind,
                                    node: event.object,
                                    observed_at: Utc::now(),
                                };
                                match event_tx.try_send(node_event) {
                                    Ok(()) => {}
                                    Err(mpsc::error::TrySendError::Full(_)) => {
                                        warn!("Node event channel full, dropping event");
                                    }
                                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                                }
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "Node watch stream error, reconnecting");
                                break;
                            }
                            None => {
                                warn!("Node watch stream closed, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Failed to open node watch, retrying in 5s");
                tokio::select! {
                    biased;
                    _ = stop.triggered() => return,
                    _ = sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }
}

async fn dispatch_loop(
    mut event_rx: mpsc::Receiver<NodeEvent>,
    pool: Arc<WorkerPool>,
    state_manager: Arc<AlertStateManager>,
    signal: ShutdownSignal,
) {
    let mut stop = signal.clone();

    loop {
        tokio::select! {
            biased;
            _ = stop.triggered() => {
                info!("Node event dispatcher stopped");
                return;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { return };

                let name = event.node.metadata.name.clone().unwrap_or_default();

                let task: Task = Box::pin(process_node_event(state_manager.clone(), event));

                if let Err(err) = pool.submit_with_signal(&signal, task) {
                    warn!(
                        node = %name,
                        error = %err,
                        "Failed to submit node event to worker pool"
                    );
                }
            }
        }
    }
}

async fn process_node_event(
    state_manager: Arc<AlertStateManager>,
    event: NodeEvent,
) -> Result<()> {
    let node = event.node;

    debug!(
        kind = ?event.kind,
        node = node.metadata.name.as_deref().unwrap_or_default(),
        "Processing node event"
    );

    for alert in rules::evaluate_node(&node) {
        let alert_type = alert.alert_type().to_string();
        if let Err(err) = state_manager.process_alert(alert).await {
            error!(
                node = node.metadata.name.as_deref().unwrap_or_default(),
                alert_type = %alert_type,
                error = %err,
                "Failed to process alert"
            );
        }
    }

    Ok(())
}
