//! Persistence tests against the JSONL store

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use telemetry_relay::pipeline::DrainTrigger;
use telemetry_relay::{
    ChannelTransport, IngestPayload, JsonlStore, JsonlStoreConfig, RelayConfig, ServerMessage,
    SubscribeRequest, TelemetryHub, TelemetryStore,
};

fn hub_over(store: Arc<JsonlStore>) -> (Arc<TelemetryHub>, Arc<ChannelTransport>) {
    let transport = Arc::new(ChannelTransport::new(256));
    let hub = Arc::new(TelemetryHub::new(&RelayConfig::default(), store, transport.clone()));
    (hub, transport)
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = Arc::new(JsonlStore::open(JsonlStoreConfig::new(dir.path())).unwrap());
        let (hub, _transport) = hub_over(store.clone());
        hub.ingest(IngestPayload::Many(vec![
            json!({"streamKey": "cpu", "value": 10, "sessionId": "s1", "timestamp": "2024-01-01T00:00:01Z"}),
            json!({"streamKey": "cpu", "value": 30, "sessionId": "s1", "timestamp": "2024-01-01T00:00:03Z"}),
            json!({"streamKey": "mem", "value": 55, "sessionId": "s1", "timestamp": "2024-01-01T00:00:02Z"}),
            json!({"streamKey": "cpu", "value": 99, "sessionId": "s2", "timestamp": "2024-01-01T00:00:09Z"}),
        ]));
        assert_eq!(hub.writer().flush_now(DrainTrigger::Shutdown).await, 4);
        assert_eq!(store.count(), 4);
    }

    let store = Arc::new(JsonlStore::open(JsonlStoreConfig::new(dir.path())).unwrap());
    assert_eq!(store.count(), 4);
    assert_eq!(store.load_all().unwrap().len(), 4);

    let (hub, transport) = hub_over(store);
    let id = hub.connect();
    let mut rx = transport.attach(&id);
    hub.subscribe(&id, SubscribeRequest::new("s1", &["cpu", "mem", "disk"]));

    assert!(matches!(rx.recv().await, Some(ServerMessage::SubscribeAck(_))));
    match rx.recv().await {
        Some(ServerMessage::Initial { points }) => {
            let summary: Vec<(String, f64)> = points
                .iter()
                .map(|p| (p.stream_key.clone(), p.value))
                .collect();
            assert_eq!(
                summary,
                vec![("cpu".to_string(), 30.0), ("mem".to_string(), 55.0)]
            );
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_lines_are_skipped_on_replay() {
    let dir = TempDir::new().unwrap();
    let config = JsonlStoreConfig::new(dir.path());
    std::fs::write(
        config.records_path(),
        concat!(
            r#"{"id":"a","streamKey":"cpu","value":1.0,"timestamp":"2024-01-01T00:00:00Z","sessionId":"s1"}"#,
            "\n{not json\n\n",
            r#"{"id":"b","streamKey":"cpu","value":2.0,"timestamp":"2024-01-01T00:00:05Z","sessionId":"s1"}"#,
            "\n"
        ),
    )
    .unwrap();

    let store = JsonlStore::open(config).unwrap();
    assert_eq!(store.count(), 2);

    let latest = store
        .latest_per_stream("s1", &["cpu".to_string()])
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, "b");
}
