//! Append-only JSONL store
//!
//! Each record is one line of `telemetry.jsonl`. A batch is written with a
//! single append followed by fsync. The newest point per (session, stream)
//! is indexed in memory and rebuilt by replaying the file on open.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::{check_record, latest_of, InsertReport, RecordFailure, StoreError, StoreResult, TelemetryStore};
use crate::types::MetricPoint;

/// Configuration for the JSONL store
#[derive(Debug, Clone)]
pub struct JsonlStoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
}

impl Default for JsonlStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl JsonlStoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get path to telemetry.jsonl
    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join("telemetry.jsonl")
    }
}

type LatestKey = (String, String);

/// File-backed store
pub struct JsonlStore {
    config: JsonlStoreConfig,
    latest: RwLock<HashMap<LatestKey, MetricPoint>>,
    count: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    /// Open the store, replaying any existing records
    pub fn open(config: JsonlStoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let store = Self {
            config,
            latest: RwLock::new(HashMap::new()),
            count: AtomicU64::new(0),
            write_lock: tokio::sync::Mutex::new(()),
        };
        store.replay()?;
        Ok(store)
    }

    pub fn config(&self) -> &JsonlStoreConfig {
        &self.config
    }

    fn replay(&self) -> StoreResult<()> {
        let path = self.config.records_path();
        if !path.exists() {
            return Ok(());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut loaded = 0u64;
        let mut skipped = 0u64;
        let mut latest = self.latest.write();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MetricPoint>(&line) {
                Ok(point) => {
                    index_point(&mut latest, point);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "skipping corrupt telemetry record");
                    skipped += 1;
                }
            }
        }

        self.count.store(loaded, Ordering::SeqCst);
        info!(path = %path.display(), loaded, skipped, "telemetry store replayed");
        Ok(())
    }

    /// Load every stored record
    pub fn load_all(&self) -> StoreResult<Vec<MetricPoint>> {
        let path = self.config.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut points = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Ok(point) = serde_json::from_str::<MetricPoint>(&line) {
                points.push(point);
            }
        }
        Ok(points)
    }
}

fn index_point(latest: &mut HashMap<LatestKey, MetricPoint>, point: MetricPoint) {
    let key = (point.session_id.clone(), point.stream_key.clone());
    match latest.get(&key) {
        Some(existing) if existing.timestamp > point.timestamp => {}
        _ => {
            latest.insert(key, point);
        }
    }
}

fn append_lines(path: &Path, payload: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(payload.as_bytes())?;
    file.sync_all()
}

#[async_trait]
impl TelemetryStore for JsonlStore {
    async fn insert_many(&self, points: &[MetricPoint]) -> StoreResult<InsertReport> {
        let mut report = InsertReport::default();
        let mut payload = String::new();
        let mut accepted = Vec::with_capacity(points.len());

        for (index, point) in points.iter().enumerate() {
            let line = check_record(point).and_then(|()| {
                serde_json::to_string(point).map_err(|e| e.to_string())
            });
            match line {
                Ok(line) => {
                    payload.push_str(&line);
                    payload.push('\n');
                    accepted.push(point.clone());
                }
                Err(reason) => report.failures.push(RecordFailure { index, reason }),
            }
        }

        if accepted.is_empty() {
            return Ok(report);
        }

        let _guard = self.write_lock.lock().await;
        let path = self.config.records_path();
        tokio::task::spawn_blocking(move || append_lines(&path, &payload))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        report.inserted = accepted.len();
        self.count.fetch_add(accepted.len() as u64, Ordering::SeqCst);
        let mut latest = self.latest.write();
        for point in accepted {
            index_point(&mut latest, point);
        }

        Ok(report)
    }

    async fn latest_per_stream(
        &self,
        session_id: &str,
        stream_keys: &[String],
    ) -> StoreResult<Vec<MetricPoint>> {
        let latest = self.latest.read();
        let candidates = stream_keys
            .iter()
            .filter_map(|key| latest.get(&(session_id.to_string(), key.clone())));
        Ok(latest_of(candidates, session_id, stream_keys))
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}
