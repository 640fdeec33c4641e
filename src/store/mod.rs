//! Time-series persistence collaborators
//!
//! The relay writes drained batches through [`TelemetryStore::insert_many`]
//! and seeds new subscribers from [`TelemetryStore::latest_per_stream`].
//!
//! - `MemoryStore`: in-process, records every batch it receives
//! - `JsonlStore`: append-only `telemetry.jsonl` with a latest-point index

mod jsonl;
mod memory;

pub use jsonl::{JsonlStore, JsonlStoreConfig};
pub use memory::MemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::MetricPoint;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a whole store operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One record rejected inside an otherwise successful batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of `insert_many`; records succeed or fail independently
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsertReport {
    pub inserted: usize,
    pub failures: Vec<RecordFailure>,
}

impl InsertReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Persistence collaborator consumed by the relay
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Persist a batch; `Err` means nothing from the batch was written
    async fn insert_many(&self, points: &[MetricPoint]) -> StoreResult<InsertReport>;

    /// Point with the greatest timestamp for each requested stream in a session
    async fn latest_per_stream(
        &self,
        session_id: &str,
        stream_keys: &[String],
    ) -> StoreResult<Vec<MetricPoint>>;

    /// Number of stored records
    fn count(&self) -> u64;
}

/// Reject records the stores cannot represent
pub(crate) fn check_record(point: &MetricPoint) -> Result<(), String> {
    if !point.value.is_finite() {
        return Err(format!("non-finite value for stream '{}'", point.stream_key));
    }
    if point.stream_key.is_empty() || point.session_id.is_empty() {
        return Err("empty stream key or session id".to_string());
    }
    Ok(())
}

/// Pick the newest point per requested stream key
///
/// Ties on timestamp go to the later point in iteration order. Output
/// follows the order of `stream_keys`, one entry per distinct key.
pub(crate) fn latest_of<'a, I>(points: I, session_id: &str, stream_keys: &[String]) -> Vec<MetricPoint>
where
    I: IntoIterator<Item = &'a MetricPoint>,
{
    let mut newest: HashMap<&str, &MetricPoint> = HashMap::new();
    for point in points {
        if point.session_id != session_id || !stream_keys.contains(&point.stream_key) {
            continue;
        }
        let slot = newest.entry(point.stream_key.as_str()).or_insert(point);
        if point.timestamp >= slot.timestamp {
            *slot = point;
        }
    }

    let mut seen = Vec::with_capacity(stream_keys.len());
    let mut latest = Vec::new();
    for key in stream_keys {
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        if let Some(point) = newest.get(key.as_str()) {
            latest.push((*point).clone());
        }
    }
    latest
}
