//! Integration tests for the telemetry hub

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use telemetry_relay::store::{InsertReport, StoreError, StoreResult};
use telemetry_relay::utils::SequentialIds;
use telemetry_relay::{
    ChannelTransport, ConnectionId, IngestPayload, MemoryStore, MetricPoint, RelayConfig,
    ServerMessage, SubscribeRequest, TelemetryHub, TelemetryStore,
};

fn config(batch_size: usize, flush_ms: u64) -> RelayConfig {
    RelayConfig {
        batch_size,
        flush_interval: Duration::from_millis(flush_ms),
        ..Default::default()
    }
}

fn setup(config: &RelayConfig, store: Arc<dyn TelemetryStore>) -> (Arc<TelemetryHub>, Arc<ChannelTransport>) {
    let transport = Arc::new(ChannelTransport::new(4096));
    let hub = Arc::new(TelemetryHub::with_ids(
        config,
        store,
        transport.clone(),
        Arc::new(SequentialIds::new("id")),
    ));
    (hub, transport)
}

fn connect(hub: &TelemetryHub, transport: &ChannelTransport) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
    let id = hub.connect();
    let rx = transport.attach(&id);
    (id, rx)
}

fn raw(stream: &str, session: &str, value: f64) -> serde_json::Value {
    json!({"streamKey": stream, "value": value, "sessionId": session})
}

/// Points received through `telemetry:update` so far
fn received_updates(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<MetricPoint> {
    let mut points = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let ServerMessage::Update { data } = message {
            points.extend(data.as_slice().iter().cloned());
        }
    }
    points
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_subscribe_registers_membership_and_keys() {
    let (hub, transport) = setup(&config(100, 1000), Arc::new(MemoryStore::new()));
    let (c, _rx) = connect(&hub, &transport);

    let ack = hub.subscribe(&c, SubscribeRequest::new("s1", &["cpu", "mem"]));
    assert!(ack.success);
    assert_eq!(ack.session_id.as_deref(), Some("s1"));

    assert!(hub.registry().members_of("s1").contains(&c));
    let state = hub.registry().lookup(&c).unwrap();
    assert_eq!(state.stream_keys, vec!["cpu".to_string(), "mem".to_string()]);
}

#[tokio::test]
async fn test_every_subscriber_gets_each_point_once_in_order() {
    let (hub, transport) = setup(&config(1000, 1000), Arc::new(MemoryStore::new()));

    // One viewer per route: session only, stream only, and both
    let (by_session, mut rx_session) = connect(&hub, &transport);
    let (by_stream, mut rx_stream) = connect(&hub, &transport);
    let (by_both, mut rx_both) = connect(&hub, &transport);
    let (other, mut rx_other) = connect(&hub, &transport);
    hub.subscribe(&by_session, SubscribeRequest::new("s1", &[]));
    hub.subscribe(&by_stream, SubscribeRequest::new("elsewhere", &["cpu"]));
    hub.subscribe(&by_both, SubscribeRequest::new("s1", &["cpu"]));
    hub.subscribe(&other, SubscribeRequest::new("s2", &["mem"]));

    for n in 0..25 {
        hub.ingest(IngestPayload::One(raw("cpu", "s1", n as f64)));
    }

    for rx in [&mut rx_session, &mut rx_stream, &mut rx_both] {
        let values: Vec<f64> = received_updates(rx).iter().map(|p| p.value).collect();
        let expected: Vec<f64> = (0..25).map(|n| n as f64).collect();
        assert_eq!(values, expected);
    }
    assert!(received_updates(&mut rx_other).is_empty());
}

#[tokio::test]
async fn test_disconnected_connection_stops_receiving() {
    let (hub, transport) = setup(&config(100, 1000), Arc::new(MemoryStore::new()));
    let (a, mut rx_a) = connect(&hub, &transport);
    let (b, mut rx_b) = connect(&hub, &transport);
    hub.subscribe(&a, SubscribeRequest::new("s1", &[]));
    hub.subscribe(&b, SubscribeRequest::new("s1", &[]));

    hub.disconnect(&a);
    assert!(!hub.registry().members_of("s1").contains(&a));

    hub.ingest(IngestPayload::One(raw("cpu", "s1", 1.0)));
    assert!(received_updates(&mut rx_a).is_empty());
    assert_eq!(received_updates(&mut rx_b).len(), 1);
}

#[tokio::test]
async fn test_late_joiner_receives_snapshot_only_for_itself() {
    let store = Arc::new(MemoryStore::new());
    let (hub, transport) = setup(&config(100, 1000), store.clone());
    let (viewer, mut rx_viewer) = connect(&hub, &transport);
    hub.subscribe(&viewer, SubscribeRequest::new("s1", &["cpu"]));

    hub.ingest(IngestPayload::Many(vec![
        json!({"streamKey": "cpu", "value": 1.0, "sessionId": "s1", "timestamp": 1000}),
        json!({"streamKey": "cpu", "value": 3.0, "sessionId": "s1", "timestamp": 3000}),
        json!({"streamKey": "cpu", "value": 2.0, "sessionId": "s1", "timestamp": 2000}),
    ]));
    hub.writer().flush_now(telemetry_relay::pipeline::DrainTrigger::Timer).await;
    settle().await;
    while rx_viewer.try_recv().is_ok() {}

    let (late, mut rx_late) = connect(&hub, &transport);
    hub.subscribe(&late, SubscribeRequest::new("s1", &["cpu", "mem"]));

    assert!(matches!(rx_late.recv().await, Some(ServerMessage::SubscribeAck(ack)) if ack.success));
    match rx_late.recv().await {
        Some(ServerMessage::Initial { points }) => {
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].value, 3.0);
        }
        other => panic!("expected snapshot, got {:?}", other),
    }

    settle().await;
    assert!(rx_viewer.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_150_points_flush_as_100_then_50() {
    let store = Arc::new(MemoryStore::new());
    let (hub, _transport) = setup(&config(100, 1000), store.clone());
    let flush = hub.start_flush_scheduler();

    for n in 0..150 {
        hub.ingest(IngestPayload::One(raw("cpu", "s1", n as f64)));
    }
    settle().await;
    assert_eq!(store.batch_sizes(), vec![100]);
    assert_eq!(hub.writer().buffered(), 50);

    tokio::time::sleep(Duration::from_millis(1001)).await;
    settle().await;
    assert_eq!(store.batch_sizes(), vec![100, 50]);
    assert_eq!(store.count(), 150);

    flush.shutdown().await;
    assert_eq!(store.batch_sizes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_drained_batches_partition_ingested_points() {
    let store = Arc::new(MemoryStore::new());
    let (hub, _transport) = setup(&config(64, 250), store.clone());
    let flush = hub.start_flush_scheduler();

    let mut expected = HashSet::new();
    for round in 0..10 {
        for n in 0..37 {
            let value = (round * 100 + n) as f64;
            expected.insert(value as i64);
            hub.ingest(IngestPayload::One(raw("cpu", "s1", value)));
        }
        tokio::time::sleep(Duration::from_millis(90)).await;
    }
    flush.shutdown().await;

    let stored = store.points();
    assert_eq!(stored.len(), expected.len());
    let seen: HashSet<i64> = stored.iter().map(|p| p.value as i64).collect();
    assert_eq!(seen, expected);
    assert_eq!(store.batch_sizes().iter().sum::<usize>(), 370);
}

/// Fails the first write, then behaves
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

#[async_trait]
impl TelemetryStore for FlakyStore {
    async fn insert_many(&self, points: &[MetricPoint]) -> StoreResult<InsertReport> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert_many(points).await
    }

    async fn latest_per_stream(&self, session_id: &str, keys: &[String]) -> StoreResult<Vec<MetricPoint>> {
        self.inner.latest_per_stream(session_id, keys).await
    }

    fn count(&self) -> u64 {
        self.inner.count()
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_is_lost_and_scheduler_keeps_going() {
    let store = Arc::new(FlakyStore::default());
    let (hub, _transport) = setup(&config(100, 500), store.clone());
    let flush = hub.start_flush_scheduler();

    for n in 0..10 {
        hub.ingest(IngestPayload::One(raw("cpu", "s1", n as f64)));
    }
    tokio::time::sleep(Duration::from_millis(501)).await;
    settle().await;

    for n in 0..4 {
        hub.ingest(IngestPayload::One(raw("cpu", "s1", n as f64)));
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;

    assert_eq!(store.count(), 4);
    let stats = hub.writer().stats();
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.failed_records, 10);
    assert_eq!(stats.persisted, 4);

    flush.shutdown().await;
}

#[tokio::test]
async fn test_malformed_ingest_never_reaches_subscribers() {
    let (hub, transport) = setup(&config(100, 1000), Arc::new(MemoryStore::new()));
    let (c, mut rx) = connect(&hub, &transport);
    hub.subscribe(&c, SubscribeRequest::new("s1", &["cpu"]));

    let accepted = hub
        .ingest_from(
            &c,
            IngestPayload::Many(vec![
                json!({"streamKey": "cpu", "sessionId": "s1"}),
                json!({"streamKey": "cpu", "value": "NaN", "sessionId": "s1"}),
            ]),
        )
        .unwrap();

    assert_eq!(accepted, 0);
    assert!(received_updates(&mut rx).is_empty());
    assert_eq!(hub.stats().malformed_points, 2);
}
