// src/bus.rs - In-memory pub/sub fan-out of alert events

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::alert::AlertEvent;
use crate::error::Result;
use crate::shutdown::Shutdown;

const EVENT_CHANNEL_CAPACITY: usize = 200;
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// A subscriber notified of every published alert event. Errors are logged
/// by the bus and never reach the publisher.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name used in failure logs.
    fn name(&self) -> &str;

    async fn on_alert(&self, event: &AlertEvent) -> Result<()>;
}

/// Distributes alert events to subscribed sinks. Sinks are registered before
/// `start`; the list is read-only afterwards, so the dispatch path takes no
/// locks. Publication is non-blocking and lossy under saturation.
pub struct EventBus {
    sinks: Vec<Arc<dyn AlertSink>>,
    event_tx: mpsc::Sender<AlertEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<AlertEvent>>>,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sinks: Vec::new(),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            dispatcher: Mutex::new(None),
        }
    }

    /// Register a sink. Only valid before `start`, which the `&mut`
    /// receiver enforces.
    pub fn subscribe(&mut self, sink: Arc<dyn AlertSink>) {
        info!(sink = sink.name(), "Sink subscribed to event bus");
        self.sinks.push(sink);
    }

    /// Spawn the dispatcher scope.
    pub async fn start(&self) {
        info!(sinks = self.sinks.len(), "Starting alert event bus");

        let Some(mut event_rx) = self.event_rx.lock().await.take() else {
            warn!("Event bus already started");
            return;
        };

        let sinks = self.sinks.clone();
        let mut signal = self.shutdown.signal();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = signal.triggered() => break,
                    event = event_rx.recv() => {
                        let Some(event) = event else { break };
                        notify_sinks(&sinks, &event).await;
                    }
                }
            }
        });

        *self.dispatcher.lock().await = Some(handle);
    }

    /// Hand an event to the dispatcher without blocking; dropped with a warn
    /// when the channel is full.
    pub fn publish(&self, event: AlertEvent) {
        if let Err(err) = self.event_tx.try_send(event) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Event bus channel full, dropping event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("Event bus stopped, dropping event");
                }
            }
        }
    }

    /// Signal the dispatcher and wait for the in-flight notification round
    /// to drain. Safe to call more than once.
    pub async fn stop(&self) {
        {
            let mut stopped = self.stopped.lock().unwrap();
            if *stopped {
                return;
            }
            *stopped = true;
        }

        self.shutdown.trigger();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            let _ = handle.await;
        }
        info!("Event bus stopped");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Notify every sink concurrently, each under its own deadline. One sink's
/// failure never reaches the others or the dispatcher.
async fn notify_sinks(sinks: &[Arc<dyn AlertSink>], event: &AlertEvent) {
    let notifications = sinks.iter().map(|sink| async move {
        match timeout(NOTIFY_TIMEOUT, sink.on_alert(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(sink = sink.name(), error = %err, "Sink notification failed");
            }
            Err(_) => {
                error!(sink = sink.name(), "Sink notification timed out");
            }
        }
    });

    join_all(notifications).await;
}
