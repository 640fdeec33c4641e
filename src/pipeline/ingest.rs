//! Ingest pipeline
//!
//! Validates raw points, queues them for persistence and broadcasts them
//! before returning. Malformed points are logged and dropped; nothing is
//! reported back to the producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::fanout::BroadcastFanout;
use super::writer::BatchWriter;
use crate::error::MalformedPoint;
use crate::types::{IngestPayload, MetricPoint, RawPoint};
use crate::utils::{now, IdGenerator};

pub struct IngestPipeline {
    writer: Arc<BatchWriter>,
    fanout: Arc<BroadcastFanout>,
    ids: Arc<dyn IdGenerator>,
    accepted: AtomicU64,
    malformed: AtomicU64,
}

impl IngestPipeline {
    pub fn new(
        writer: Arc<BatchWriter>,
        fanout: Arc<BroadcastFanout>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            writer,
            fanout,
            ids,
            accepted: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    /// Accept a payload; returns how many points were valid
    pub fn ingest(&self, payload: IngestPayload) -> usize {
        match payload {
            IngestPayload::One(raw) => match self.validate(&raw) {
                Some(point) => {
                    self.writer.enqueue(point.clone());
                    self.fanout.deliver(&point);
                    1
                }
                None => 0,
            },
            IngestPayload::Many(raws) => {
                let points: Vec<MetricPoint> =
                    raws.iter().filter_map(|raw| self.validate(raw)).collect();
                if points.is_empty() {
                    return 0;
                }
                for point in &points {
                    self.writer.enqueue(point.clone());
                }
                self.fanout.deliver_batch(&points);
                points.len()
            }
        }
    }

    fn validate(&self, raw: &Value) -> Option<MetricPoint> {
        let result = RawPoint::from_json(raw)
            .and_then(|point| point.validate(now(), self.ids.next_id()));
        match result {
            Ok(point) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Some(point)
            }
            Err(e) => {
                self.record_malformed(&e, raw);
                None
            }
        }
    }

    fn record_malformed(&self, error: &MalformedPoint, raw: &Value) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, point = %raw, "dropping malformed telemetry point");
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}
