//! Broadcast fanout
//!
//! A point goes to every member of its session and every direct
//! subscriber of its stream key. A connection reachable both ways still
//! gets it once. Send failures are per connection and never stop the loop.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::protocol::{ServerMessage, UpdatePayload};
use crate::registry::ConnectionRegistry;
use crate::transport::Transport;
use crate::types::{ConnectionId, MetricPoint};

pub struct BroadcastFanout {
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Transport>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl BroadcastFanout {
    pub fn new(registry: Arc<ConnectionRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Send one point as a `telemetry:update`; returns successful deliveries
    pub fn deliver(&self, point: &MetricPoint) -> usize {
        let recipients = self.registry.recipients(&point.session_id, &point.stream_key);
        let mut sent = 0;
        for connection_id in &recipients {
            let message = ServerMessage::Update {
                data: UpdatePayload::One(point.clone()),
            };
            if self.send(connection_id, message) {
                sent += 1;
            }
        }
        sent
    }

    /// Send a batch of points
    ///
    /// Each connection receives one `telemetry:update` holding, in ingest
    /// order, exactly the points routed to it.
    pub fn deliver_batch(&self, points: &[MetricPoint]) -> usize {
        let mut per_connection: BTreeMap<ConnectionId, Vec<MetricPoint>> = BTreeMap::new();
        for point in points {
            for connection_id in self.registry.recipients(&point.session_id, &point.stream_key) {
                per_connection.entry(connection_id).or_default().push(point.clone());
            }
        }

        let mut sent = 0;
        for (connection_id, points) in per_connection {
            let message = ServerMessage::Update {
                data: UpdatePayload::Many(points),
            };
            if self.send(&connection_id, message) {
                sent += 1;
            }
        }
        sent
    }

    fn send(&self, connection_id: &ConnectionId, message: ServerMessage) -> bool {
        match self.transport.send(connection_id, message) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                debug!(connection = %connection_id, error = %e, "update not delivered");
                false
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
