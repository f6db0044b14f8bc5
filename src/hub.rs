// src/hub.rs - WebSocket hub: client registry, broadcast fan-out, heartbeats

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use warp::ws::{Message, WebSocket, Ws};
use warp::Filter;

use crate::alert::AlertEvent;
use crate::bus::AlertSink;
use crate::error::{MonitorError, Result};
use crate::shutdown::{Shutdown, ShutdownSignal};

const BROADCAST_CHANNEL_CAPACITY: usize = 500;
const REGISTER_CHANNEL_CAPACITY: usize = 64;
const READ_DEADLINE: Duration = Duration::from_secs(60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frame sent to (and parsed from) WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WireMessage {
    fn new(kind: &str, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// A connected client. The write half lives behind a mutex so broadcasts,
/// pong replies, and heartbeat pings can never interleave bytes.
pub struct Client {
    id: u64,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl Client {
    async fn send(&self, message: Message) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match timeout(WRITE_TIMEOUT, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(MonitorError::Protocol(err.to_string())),
            Err(_) => Err(MonitorError::Protocol("write timed out".to_string())),
        }
    }

    async fn send_json(&self, message: &WireMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.send(Message::text(text)).await
    }

    async fn ping(&self) -> Result<()> {
        self.send(Message::ping(Vec::new())).await
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}

/// Fans alert events out to every connected WebSocket client. One run scope
/// owns the client map; per-connection scopes only talk to it over channels.
pub struct Hub {
    clients: Arc<RwLock<HashMap<u64, Arc<Client>>>>,
    register_tx: mpsc::Sender<Arc<Client>>,
    register_rx: Mutex<Option<mpsc::Receiver<Arc<Client>>>>,
    unregister_tx: mpsc::Sender<u64>,
    unregister_rx: Mutex<Option<mpsc::Receiver<u64>>>,
    broadcast_tx: mpsc::Sender<WireMessage>,
    broadcast_rx: Mutex<Option<mpsc::Receiver<WireMessage>>>,
    next_client_id: AtomicU64,
    shutdown: Shutdown,
    stopped: StdMutex<bool>,
    run_task: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    pub fn new() -> Self {
        let (register_tx, register_rx) = mpsc::channel(REGISTER_CHANNEL_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(REGISTER_CHANNEL_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);

        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            register_tx,
            register_rx: Mutex::new(Some(register_rx)),
            unregister_tx,
            unregister_rx: Mutex::new(Some(unregister_rx)),
            broadcast_tx,
            broadcast_rx: Mutex::new(Some(broadcast_rx)),
            next_client_id: AtomicU64::new(1),
            shutdown: Shutdown::new(),
            stopped: StdMutex::new(false),
            run_task: Mutex::new(None),
        }
    }

    /// Spawn the hub scope.
    pub async fn start(&self) {
        info!("Starting WebSocket hub");

        let (Some(register_rx), Some(unregister_rx), Some(broadcast_rx)) = (
            self.register_rx.lock().await.take(),
            self.unregister_rx.lock().await.take(),
            self.broadcast_rx.lock().await.take(),
        ) else {
            warn!("WebSocket hub already started");
            return;
        };

        let handle = tokio::spawn(run_loop(
            self.clients.clone(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            self.shutdown.signal(),
        ));
        *self.run_task.lock().await = Some(handle);
    }

    /// Queue a frame for every connected client; dropped with a warn when the
    /// broadcast channel is full.
    pub fn broadcast(&self, message: WireMessage) {
        if self.broadcast_tx.try_send(message).is_err() {
            warn!("Broadcast channel full, dropping message");
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn contains(&self, client_id: u64) -> bool {
        self.clients.read().await.contains_key(&client_id)
    }

    async fn register(&self, client: Arc<Client>) -> Result<()> {
        self.register_tx
            .send(client)
            .await
            .map_err(|_| MonitorError::Stopped)
    }

    async fn unregister(&self, client_id: u64) {
        let _ = self.unregister_tx.send(client_id).await;
    }

    /// Close every client and stop the hub scope. Safe to call twice.
    pub async fn stop(&self) {
        {
            let mut stopped = self.stopped.lock().unwrap();
            if *stopped {
                return;
            }
            *stopped = true;
        }

        self.shutdown.trigger();
        if let Some(handle) = self.run_task.lock().await.take() {
            let _ = handle.await;
        }
        info!("WebSocket hub stopped");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for Hub {
    fn name(&self) -> &str {
        "websocket_hub"
    }

    async fn on_alert(&self, event: &AlertEvent) -> Result<()> {
        let payload = serde_json::to_value(&event.alert)?;
        self.broadcast(WireMessage::new("alert", payload));
        Ok(())
    }
}

async fn run_loop(
    clients: Arc<RwLock<HashMap<u64, Arc<Client>>>>,
    mut register_rx: mpsc::Receiver<Arc<Client>>,
    mut unregister_rx: mpsc::Receiver<u64>,
    mut broadcast_rx: mpsc::Receiver<WireMessage>,
    signal: ShutdownSignal,
) {
    let mut stop = signal;

    loop {
        tokio::select! {
            biased;
            _ = stop.triggered() => {
                let mut clients = clients.write().await;
                for (_, client) in clients.drain() {
                    client.close().await;
                }
                return;
            }
            Some(client) = register_rx.recv() => {
                clients.write().await.insert(client.id, client);
                info!("WebSocket client registered");
            }
            Some(client_id) = unregister_rx.recv() => {
                if let Some(client) = clients.write().await.remove(&client_id) {
                    client.close().await;
                    info!("WebSocket client unregistered");
                }
            }
            Some(message) = broadcast_rx.recv() => {
                // Snapshot under the read lock, release, then write so a slow
                // client cannot hold the registry.
                let snapshot: Vec<Arc<Client>> = {
                    clients.read().await.values().cloned().collect()
                };

                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        error!(error = %err, "Failed to serialize broadcast message");
                        continue;
                    }
                };

                for client in snapshot {
                    if let Err(err) = client.send(Message::text(text.clone())).await {
                        error!(error = %err, "WebSocket write failed");
                        if let Some(failed) = clients.write().await.remove(&client.id) {
                            failed.close().await;
                            info!("WebSocket client unregistered");
                        }
                    }
                }
            }
        }
    }
}

/// Warp filter exposing the hub at `GET /ws`.
pub fn ws_route(
    hub: Arc<Hub>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(warp::any().map(move || hub.clone()))
        .map(|ws: Ws, hub: Arc<Hub>| {
            ws.on_upgrade(move |socket| client_connected(socket, hub))
        })
}

/// Per-connection scope: register, read until error or deadline, heartbeat
/// in a side scope, unregister on the way out.
pub async fn client_connected(socket: WebSocket, hub: Arc<Hub>) {
    let (sink, mut stream) = socket.split();
    let client = Arc::new(Client {
        id: hub.next_client_id.fetch_add(1, Ordering::Relaxed),
        sink: Mutex::new(sink),
    });

    if hub.register(client.clone()).await.is_err() {
        warn!("WebSocket hub not running, dropping connection");
        return;
    }
    info!("New WebSocket client connected");

    let heartbeat = tokio::spawn(heartbeat_loop(hub.clone(), client.clone()));

    // Read loop. Only a protocol pong re-arms the read deadline; a peer that
    // never answers the heartbeat pings is dropped after one deadline no
    // matter what else it sends.
    let deadline = sleep(READ_DEADLINE);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!(client = client.id, "WebSocket read deadline expired");
                break;
            }
            item = stream.next() => match item {
                None => break,
                Some(Err(err)) => {
                    debug!(client = client.id, error = %err, "WebSocket read failed");
                    break;
                }
                Some(Ok(message)) => {
                    if message.is_pong() {
                        deadline.as_mut().reset(Instant::now() + READ_DEADLINE);
                        continue;
                    }
                    if message.is_close() {
                        break;
                    }
                    if let Ok(text) = message.to_str() {
                        if let Err(err) = handle_text_frame(&client, text).await {
                            debug!(client = client.id, error = %err, "Failed to answer client frame");
                            break;
                        }
                    }
                }
            }
        }
    }

    heartbeat.abort();
    hub.unregister(client.id).await;
}

/// Reply to JSON ping frames; everything else is ignored.
async fn handle_text_frame(client: &Client, text: &str) -> Result<()> {
    let Ok(frame) = serde_json::from_str::<serde_json::Value>(text) else {
        return Ok(());
    };

    if frame.get("type").and_then(|t| t.as_str()) == Some("ping") {
        let pong = WireMessage::new("pong", serde_json::json!({}));
        client.send_json(&pong).await?;
    }

    Ok(())
}

/// Server-initiated control pings. A failed write means the client is gone.
async fn heartbeat_loop(hub: Arc<Hub>, client: Arc<Client>) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    ticker.tick().await; // the first tick is immediate

    loop {
        ticker.tick().await;

        if !hub.contains(client.id).await {
            return;
        }

        if let Err(err) = client.ping().await {
            error!(client = client.id, error = %err, "Failed to send ping");
            hub.unregister(client.id).await;
            return;
        }
    }
}
