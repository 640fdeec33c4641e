//! In-memory store

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{check_record, latest_of, InsertReport, RecordFailure, StoreResult, TelemetryStore};
use crate::types::MetricPoint;

/// Keeps every point in process memory
///
/// Also remembers the size of each `insert_many` call, which makes batch
/// boundaries observable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    points: RwLock<Vec<MetricPoint>>,
    batches: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored points in insertion order
    pub fn points(&self) -> Vec<MetricPoint> {
        self.points.read().clone()
    }

    /// Length of every batch passed to `insert_many`, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert_many(&self, points: &[MetricPoint]) -> StoreResult<InsertReport> {
        self.batches.lock().push(points.len());

        let mut report = InsertReport::default();
        let mut stored = self.points.write();
        for (index, point) in points.iter().enumerate() {
            match check_record(point) {
                Ok(()) => {
                    stored.push(point.clone());
                    report.inserted += 1;
                }
                Err(reason) => report.failures.push(RecordFailure { index, reason }),
            }
        }

        debug!(inserted = report.inserted, failed = report.failures.len(), "memory batch stored");
        Ok(report)
    }

    async fn latest_per_stream(
        &self,
        session_id: &str,
        stream_keys: &[String],
    ) -> StoreResult<Vec<MetricPoint>> {
        Ok(latest_of(self.points.read().iter(), session_id, stream_keys))
    }

    fn count(&self) -> u64 {
        self.points.read().len() as u64
    }
}
