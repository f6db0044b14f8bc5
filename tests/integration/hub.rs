// tests/integration/hub.rs - WebSocket hub fan-out and client lifecycle

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use clusterpulse::alert::{Alert, AlertEvent, AlertSeverity, AlertSource};
use clusterpulse::bus::AlertSink;
use clusterpulse::hub::{ws_route, Hub};

use crate::helpers::wait_until;

fn event(message: &str) -> AlertEvent {
    AlertEvent {
        alert: Alert::new(
            AlertSeverity::Critical,
            AlertSource::Pod,
            message,
            1.0,
            HashMap::from([("alert_type".to_string(), "pod_failed".to_string())]),
        ),
        timestamp: Utc::now(),
    }
}

async fn started_hub() -> Arc<Hub> {
    let hub = Arc::new(Hub::new());
    hub.start().await;
    hub
}

#[tokio::test]
async fn broadcast_reaches_every_client() {
    let hub = started_hub().await;
    let route = ws_route(hub.clone());

    let mut first = warp::test::ws()
        .path("/ws")
        .handshake(route.clone())
        .await
        .expect("handshake");
    let mut second = warp::test::ws()
        .path("/ws")
        .handshake(route.clone())
        .await
        .expect("handshake");

    wait_until("both clients to register", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 2 }
    })
    .await;

    hub.on_alert(&event("pod prod/web-7 failed")).await.unwrap();

    for client in [&mut first, &mut second] {
        let message = client.recv().await.expect("alert frame");
        let text = message.to_str().expect("text frame");
        let frame: serde_json::Value = serde_json::from_str(text).expect("valid JSON");

        assert_eq!(frame["type"], "alert");
        assert_eq!(frame["payload"]["severity"], "critical");
        assert_eq!(frame["payload"]["source"], "k8s_pod");
        assert_eq!(frame["payload"]["labels"]["alert_type"], "pod_failed");
        assert_eq!(frame["payload"]["status"], "firing");
        assert!(frame["payload"]["id"].is_string());
        assert!(frame["timestamp"].is_string());
    }

    hub.stop().await;
}

#[tokio::test]
async fn json_ping_gets_a_pong_reply() {
    let hub = started_hub().await;
    let route = ws_route(hub.clone());

    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(route)
        .await
        .expect("handshake");

    wait_until("client to register", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 1 }
    })
    .await;

    client
        .send(warp::ws::Message::text(r#"{"type":"ping"}"#))
        .await;

    let message = client.recv().await.expect("pong frame");
    let frame: serde_json::Value =
        serde_json::from_str(message.to_str().expect("text frame")).unwrap();
    assert_eq!(frame["type"], "pong");
    assert!(frame["timestamp"].is_string());

    hub.stop().await;
}

#[tokio::test]
async fn disconnected_client_is_unregistered() {
    let hub = started_hub().await;
    let route = ws_route(hub.clone());

    let staying = warp::test::ws()
        .path("/ws")
        .handshake(route.clone())
        .await
        .expect("handshake");
    let leaving = warp::test::ws()
        .path("/ws")
        .handshake(route.clone())
        .await
        .expect("handshake");

    wait_until("both clients to register", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 2 }
    })
    .await;

    drop(leaving);

    wait_until("the dead client to be unregistered", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 1 }
    })
    .await;

    // The surviving client still receives broadcasts.
    hub.on_alert(&event("still here")).await.unwrap();
    let mut staying = staying;
    let message = staying.recv().await.expect("alert frame");
    assert!(message.to_str().unwrap().contains("still here"));

    hub.stop().await;
}

/// Interleaved broadcasts and client pings: every received frame is a whole,
/// valid JSON document. The per-client write lock forbids byte interleaving.
#[tokio::test]
async fn concurrent_broadcasts_and_pings_never_corrupt_frames() {
    let hub = started_hub().await;
    let route = ws_route(hub.clone());

    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(route)
        .await
        .expect("handshake");

    wait_until("client to register", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 1 }
    })
    .await;

    for i in 0..25 {
        hub.on_alert(&event(&format!("burst-{i}"))).await.unwrap();
        if i % 5 == 0 {
            client
                .send(warp::ws::Message::text(r#"{"type":"ping"}"#))
                .await;
        }
    }

    let mut alerts = 0;
    let mut pongs = 0;
    while alerts < 25 || pongs < 5 {
        let message = client.recv().await.expect("frame");
        let frame: serde_json::Value =
            serde_json::from_str(message.to_str().expect("text frame"))
                .expect("every frame is intact JSON");
        match frame["type"].as_str() {
            Some("alert") => alerts += 1,
            Some("pong") => pongs += 1,
            other => panic!("unexpected frame type: {other:?}"),
        }
    }

    hub.stop().await;
}

#[tokio::test]
async fn stop_closes_clients_and_is_idempotent() {
    let hub = started_hub().await;
    let route = ws_route(hub.clone());

    let mut client = warp::test::ws()
        .path("/ws")
        .handshake(route)
        .await
        .expect("handshake");

    wait_until("client to register", || {
        let hub = hub.clone();
        async move { hub.client_count().await == 1 }
    })
    .await;

    hub.stop().await;
    hub.stop().await; // second call returns immediately

    assert_eq!(hub.client_count().await, 0);
    client.recv_closed().await.expect("connection closed");
}
