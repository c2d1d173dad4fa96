#![allow(clippy::unwrap_used)]
// Session lifecycle tests against a local event stream server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use deconz_core::{
    Capability, CapabilityValue, ConnectionState, Device, DeviceEvent, DeviceRegistry, Dispatch,
    GatewayConfig, GatewaySession, MemorySettingsStore, RepairOutcome, ResourceKind,
    STREAM_DOWN_REASON, SessionOptions,
};

// ── Helpers ─────────────────────────────────────────────────────────

const WAIT: Duration = Duration::from_secs(5);

fn options() -> SessionOptions {
    SessionOptions {
        poll_interval_minutes: 0,
        auto_repair: false,
        request_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_secs(30),
        reconnect_delay: Duration::from_millis(200),
        ..SessionOptions::default()
    }
}

fn session(ws_port: u16, options: SessionOptions) -> (GatewaySession, Arc<Device>) {
    let registry = Arc::new(DeviceRegistry::new());
    let lamp = registry.register(Device::new(
        ResourceKind::Lights,
        "3",
        "Desk lamp",
        [Capability::Onoff, Capability::Dim],
    ));
    let config = GatewayConfig::new("127.0.0.1", 80, ws_port, SecretString::from("KEY".to_owned()));
    let session = GatewaySession::new(
        config,
        options,
        registry,
        Arc::new(MemorySettingsStore::new()),
    );
    (session, lamp)
}

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn wait_for_state(session: &GatewaySession, wanted: ConnectionState) {
    let mut rx = session.subscribe_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == wanted))
        .await
        .unwrap()
        .unwrap();
}

fn drain(rx: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn unavailability_count(events: &[DeviceEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, DeviceEvent::AvailabilityChanged { available: false, .. }))
        .count()
}

// ── Stream lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn test_stream_message_then_close_reconnects_once() {
    let (listener, port) = listener().await;
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        // First generation: one update, then the gateway closes.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        accepted_tx.send(1).unwrap();
        ws.send(Message::text(
            json!({"t":"event","e":"changed","r":"lights","id":"3","state":{"on":true,"bri":255}})
                .to_string(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        // Second generation stays open.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        accepted_tx.send(2).unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (session, lamp) = session(port, options());
    let mut events = lamp.subscribe();
    session.connect().await;

    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some(1));
    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some(2));
    wait_for_state(&session, ConnectionState::Connected).await;

    assert_eq!(
        lamp.capability_value(Capability::Onoff),
        Some(CapabilityValue::Bool(true))
    );
    assert_eq!(
        lamp.capability_value(Capability::Dim),
        Some(CapabilityValue::Number(1.0))
    );

    let snapshot = lamp.snapshot();
    assert!(!snapshot.available);
    assert_eq!(snapshot.unavailable_reason.as_deref(), Some(STREAM_DOWN_REASON));

    let events = drain(&mut events);
    assert_eq!(unavailability_count(&events), 1);
    assert!(session.last_message_at().is_some());

    session.shutdown().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_gateway_keeps_retrying_without_repeat_broadcasts() {
    let (listener, port) = listener().await;
    drop(listener);

    let (session, lamp) = session(port, options());
    let mut events = lamp.subscribe();
    session.connect().await;

    // Several reconnect rounds at 200 ms each.
    tokio::time::sleep(Duration::from_millis(900)).await;

    assert!(!lamp.is_available());
    assert_eq!(unavailability_count(&drain(&mut events)), 1);
    assert_ne!(session.connection_state(), ConnectionState::Connected);

    session.shutdown().await;
}

// ── Keepalive ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_watchdog_drops_silent_connection() {
    let (listener, port) = listener().await;
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        // Answer nothing; only read until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
        closed_tx.send(()).unwrap();
    });

    let opts = SessionOptions {
        ping_interval: Duration::from_millis(100),
        reconnect_delay: Duration::from_secs(30),
        ..options()
    };
    let (session, lamp) = session(port, opts);
    session.connect().await;
    wait_for_state(&session, ConnectionState::Connected).await;

    tokio::time::timeout(WAIT, closed_rx.recv()).await.unwrap();
    wait_for_state(&session, ConnectionState::Disconnected).await;
    assert_eq!(
        lamp.snapshot().unavailable_reason.as_deref(),
        Some(STREAM_DOWN_REASON)
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_gateway_pings_keep_connection_alive() {
    let (listener, port) = listener().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let (mut write, mut read) = ws.split();
        tokio::spawn(async move { while read.next().await.is_some() {} });
        loop {
            if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let opts = SessionOptions {
        ping_interval: Duration::from_millis(100),
        ..options()
    };
    let (session, lamp) = session(port, opts);
    session.connect().await;
    wait_for_state(&session, ConnectionState::Connected).await;

    // Well past the 310 ms keepalive window.
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert!(lamp.is_available());

    session.shutdown().await;
}

// ── Configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn test_incomplete_config_never_connects() {
    let registry = Arc::new(DeviceRegistry::new());
    let session = GatewaySession::new(
        GatewayConfig::default(),
        options(),
        registry,
        Arc::new(MemorySettingsStore::new()),
    );

    let err = session.start().await.unwrap_err();
    assert!(err.to_string().contains("host"));

    session.connect().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_update_config_switches_gateway() {
    let (first, first_port) = listener().await;
    let (second, second_port) = listener().await;
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();

    for (listener, tag) in [(first, "first"), (second, "second")] {
        let tx = accepted_tx.clone();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            tx.send(tag).unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });
    }

    let (session, _lamp) = session(first_port, options());
    session.connect().await;
    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some("first"));

    // Same endpoint: no reconnect.
    let same = (*session.config()).clone();
    session.update_config(same.clone()).await;

    let moved = GatewayConfig {
        ws_port: Some(second_port),
        ..same
    };
    session.update_config(moved).await;
    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some("second"));
    wait_for_state(&session, ConnectionState::Connected).await;

    session.shutdown().await;
}

// ── Simulation and repair ───────────────────────────────────────────

#[tokio::test]
async fn test_handle_message_simulates_push() {
    let (session, lamp) = session(1, options());

    let outcome = session.handle_message(r#"{"r":"lights","id":"3","state":{"bri":51}}"#);
    assert!(matches!(outcome, Dispatch::Applied(_)));
    assert_eq!(
        lamp.capability_value(Capability::Dim),
        Some(CapabilityValue::Number(0.2))
    );
    assert_eq!(session.handle_message("garbage"), Dispatch::Invalid);
}

async fn discovery_server(host: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "00212EFFFF012345", "internalipaddress": host, "internalport": 80 }
        ])))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_repair_persists_new_host() {
    let server = discovery_server("127.0.0.9").await;
    let store = Arc::new(MemorySettingsStore::new());
    let opts = SessionOptions {
        discovery_url: Url::parse(&server.uri()).unwrap(),
        ..options()
    };
    let config = GatewayConfig::new("127.0.0.1", 80, 1, SecretString::from("KEY".to_owned()));
    let session = GatewaySession::new(
        config,
        opts,
        Arc::new(DeviceRegistry::new()),
        store.clone(),
    );

    let outcome = session.repair().await.unwrap();
    assert_eq!(
        outcome,
        RepairOutcome::HostChanged {
            previous: Some("127.0.0.1".into()),
            host: "127.0.0.9".into(),
        }
    );
    assert_eq!(store.host().as_deref(), Some("127.0.0.9"));
    assert_eq!(session.config().host.as_deref(), Some("127.0.0.9"));

    // Second pass finds the same address.
    assert_eq!(session.repair().await.unwrap(), RepairOutcome::Unchanged);

    session.shutdown().await;
}

#[tokio::test]
async fn test_repair_failure_leaves_config_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = Arc::new(MemorySettingsStore::new());
    let opts = SessionOptions {
        discovery_url: Url::parse(&server.uri()).unwrap(),
        ..options()
    };
    let config = GatewayConfig::new("127.0.0.1", 80, 1, SecretString::from("KEY".to_owned()));
    let session = GatewaySession::new(config, opts, Arc::new(DeviceRegistry::new()), store.clone());

    assert!(session.repair().await.is_err());
    assert!(store.host().is_none());
    assert_eq!(session.config().host.as_deref(), Some("127.0.0.1"));
}

// ── Auto-repair on close ────────────────────────────────────────────

fn repairing_session(
    ws_port: u16,
    discovery: &MockServer,
    store: Arc<MemorySettingsStore>,
) -> GatewaySession {
    let opts = SessionOptions {
        auto_repair: true,
        reconnect_delay: Duration::from_secs(10),
        discovery_url: Url::parse(&discovery.uri()).unwrap(),
        ..options()
    };
    let config = GatewayConfig::new("127.0.0.1", 80, ws_port, SecretString::from("KEY".to_owned()));
    GatewaySession::new(config, opts, Arc::new(DeviceRegistry::new()), store)
}

#[tokio::test]
async fn test_closed_stream_repairs_and_follows_new_host() {
    let (first, port) = listener().await;
    let second = TcpListener::bind(("127.0.0.2", port)).await.unwrap();
    let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();

    let tx = accepted_tx.clone();
    tokio::spawn(async move {
        let (tcp, _) = first.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        tx.send("first").unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });
    tokio::spawn(async move {
        let (tcp, _) = second.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        accepted_tx.send("second").unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let discovery = discovery_server("127.0.0.2").await;
    let store = Arc::new(MemorySettingsStore::new());
    let session = repairing_session(port, &discovery, store.clone());
    session.connect().await;

    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some("first"));
    // Well inside the 10 s reconnect delay: the repaired host is dialled at once.
    assert_eq!(tokio::time::timeout(WAIT, accepted_rx.recv()).await.unwrap(), Some("second"));
    assert_eq!(store.host().as_deref(), Some("127.0.0.2"));
    assert_eq!(session.config().host.as_deref(), Some("127.0.0.2"));

    session.shutdown().await;
}

#[tokio::test]
async fn test_never_connected_stream_skips_repair() {
    let (listener, port) = listener().await;
    drop(listener);

    let discovery = discovery_server("127.0.0.2").await;
    let store = Arc::new(MemorySettingsStore::new());
    let session = repairing_session(port, &discovery, store.clone());
    session.connect().await;

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(discovery.received_requests().await.unwrap().is_empty());
    assert!(store.host().is_none());
    assert_eq!(session.config().host.as_deref(), Some("127.0.0.1"));

    session.shutdown().await;
}
