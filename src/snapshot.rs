//! Snapshot provider
//!
//! Read-only view over the store used to seed a new subscriber with the
//! latest point of each requested stream.

use std::sync::Arc;

use crate::store::{StoreResult, TelemetryStore};
use crate::types::MetricPoint;

pub struct SnapshotProvider {
    store: Arc<dyn TelemetryStore>,
}

impl SnapshotProvider {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Latest point per stream key, at most one entry per key
    ///
    /// An empty key list returns immediately without touching the store.
    pub async fn latest(&self, session_id: &str, stream_keys: &[String]) -> StoreResult<Vec<MetricPoint>> {
        if stream_keys.is_empty() {
            return Ok(Vec::new());
        }
        self.store.latest_per_stream(session_id, stream_keys).await
    }
}
