//! Telemetry hub
//!
//! Wires the registry, ingest pipeline, fanout, batch writer and snapshot
//! provider together and exposes the inbound operations a transport layer
//! needs: connect, subscribe, ingest, disconnect.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::pipeline::{
    BatchWriter, BroadcastFanout, FlushHandle, FlushScheduler, IngestPipeline, WriterStats,
};
use crate::protocol::{ServerMessage, SubscribeAck, SubscribeRequest};
use crate::registry::ConnectionRegistry;
use crate::snapshot::SnapshotProvider;
use crate::store::TelemetryStore;
use crate::transport::Transport;
use crate::types::{ConnectionId, IngestPayload};
use crate::utils::{IdGenerator, UuidIds};

/// Counters reported by `/api/stats`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub sessions: usize,
    pub accepted_points: u64,
    pub malformed_points: u64,
    pub deliveries: u64,
    pub failed_deliveries: u64,
    pub stored_records: u64,
    pub writer: WriterStats,
}

pub struct TelemetryHub {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Transport>,
    fanout: Arc<BroadcastFanout>,
    pipeline: IngestPipeline,
    writer: Arc<BatchWriter>,
    snapshots: Arc<SnapshotProvider>,
    store: Arc<dyn TelemetryStore>,
    ids: Arc<dyn IdGenerator>,
    flush_interval: Duration,
}

impl TelemetryHub {
    pub fn new(
        config: &RelayConfig,
        store: Arc<dyn TelemetryStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_ids(config, store, transport, Arc::new(UuidIds))
    }

    /// Build a hub with a caller-supplied id source
    pub fn with_ids(
        config: &RelayConfig,
        store: Arc<dyn TelemetryStore>,
        transport: Arc<dyn Transport>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let fanout = Arc::new(BroadcastFanout::new(registry.clone(), transport.clone()));
        let writer = Arc::new(BatchWriter::new(store.clone(), config.batch_size, config.max_buffer));
        let pipeline = IngestPipeline::new(writer.clone(), fanout.clone(), ids.clone());

        Self {
            registry,
            transport,
            fanout,
            pipeline,
            writer,
            snapshots: Arc::new(SnapshotProvider::new(store.clone())),
            store,
            ids,
            flush_interval: config.flush_interval,
        }
    }

    /// Register a new transport connection
    pub fn connect(&self) -> ConnectionId {
        let connection_id = ConnectionId::from(self.ids.next_id());
        self.registry.register(connection_id.clone());
        info!(connection = %connection_id, "client connected");
        connection_id
    }

    /// Apply a subscribe request
    ///
    /// The ack is sent to the connection before the snapshot query starts,
    /// so `subscribe:ack` always precedes `telemetry:initial`.
    pub fn subscribe(&self, connection_id: &ConnectionId, request: SubscribeRequest) -> SubscribeAck {
        let session_id = request.session_id.unwrap_or_default();

        match self
            .registry
            .set_subscription(connection_id, &session_id, request.stream_keys)
        {
            Ok(state) => {
                let ack = SubscribeAck::accepted(&state);
                self.notify(connection_id, ServerMessage::SubscribeAck(ack.clone()));
                self.spawn_snapshot(connection_id.clone(), session_id, state.stream_keys);
                ack
            }
            Err(e) => {
                match &e {
                    RelayError::UnknownConnection(_) => {
                        debug!(connection = %connection_id, "subscribe from unknown connection")
                    }
                    _ => warn!(connection = %connection_id, error = %e, "subscribe rejected"),
                }
                let ack = SubscribeAck::rejected(&e);
                self.notify(connection_id, ServerMessage::SubscribeAck(ack.clone()));
                ack
            }
        }
    }

    fn spawn_snapshot(&self, connection_id: ConnectionId, session_id: String, stream_keys: Vec<String>) {
        let snapshots = self.snapshots.clone();
        let transport = self.transport.clone();
        tokio::spawn(async move {
            match snapshots.latest(&session_id, &stream_keys).await {
                Ok(points) => {
                    let count = points.len();
                    match transport.send(&connection_id, ServerMessage::Initial { points }) {
                        Ok(()) => debug!(connection = %connection_id, points = count, "snapshot sent"),
                        Err(e) => debug!(connection = %connection_id, error = %e, "snapshot not delivered"),
                    }
                }
                Err(e) => {
                    warn!(connection = %connection_id, session = %session_id, error = %e, "snapshot query failed")
                }
            }
        });
    }

    fn notify(&self, connection_id: &ConnectionId, message: ServerMessage) {
        if let Err(e) = self.transport.send(connection_id, message) {
            debug!(connection = %connection_id, error = %e, "message not delivered");
        }
    }

    /// Ingest points that arrived on a connection
    ///
    /// Events from connections the registry does not know are ignored.
    pub fn ingest_from(&self, connection_id: &ConnectionId, payload: IngestPayload) -> RelayResult<usize> {
        if !self.registry.contains(connection_id) {
            debug!(connection = %connection_id, "ingest from unknown connection ignored");
            return Err(RelayError::UnknownConnection(connection_id.clone()));
        }
        Ok(self.pipeline.ingest(payload))
    }

    /// Ingest points from a producer that is not a registered connection
    pub fn ingest(&self, payload: IngestPayload) -> usize {
        self.pipeline.ingest(payload)
    }

    /// Tear down a connection; unknown ids are a no-op
    pub fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.registry.remove(connection_id);
        self.transport.release(connection_id);
        match removed {
            Some(state) => {
                info!(connection = %connection_id, session = ?state.session_id, "client disconnected");
                true
            }
            None => false,
        }
    }

    /// Start the periodic flush task
    pub fn start_flush_scheduler(&self) -> FlushHandle {
        FlushScheduler::new(self.writer.clone(), self.flush_interval).spawn()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn writer(&self) -> &Arc<BatchWriter> {
        &self.writer
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.connection_count(),
            sessions: self.registry.session_count(),
            accepted_points: self.pipeline.accepted(),
            malformed_points: self.pipeline.malformed(),
            deliveries: self.fanout.delivered(),
            failed_deliveries: self.fanout.failed(),
            stored_records: self.store.count(),
            writer: self.writer.stats(),
        }
    }
}
