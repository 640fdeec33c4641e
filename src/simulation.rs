//! Demo data simulation
//!
//! Generates a random walk for every visible stream in the catalog and
//! feeds it through the hub like any other producer. Intended for local
//! development and dashboards without real sensors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::hub::TelemetryHub;
use crate::types::{IngestPayload, StreamDefinition};
use crate::utils::{epoch_millis, now};

/// How often the catalog is re-read to pick up new streams
pub const CATALOG_REFRESH: Duration = Duration::from_secs(5);

/// Probability of a spike on any generated point
const SPIKE_CHANCE: f64 = 0.1;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where stream definitions come from
#[derive(Debug, Clone)]
pub enum StreamCatalog {
    Builtin,
    File(PathBuf),
}

impl StreamCatalog {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(StreamCatalog::File).unwrap_or(StreamCatalog::Builtin)
    }

    pub fn load(&self) -> Result<Vec<StreamDefinition>, CatalogError> {
        match self {
            StreamCatalog::Builtin => Ok(builtin_streams()),
            StreamCatalog::File(path) => {
                let contents = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&contents)?)
            }
        }
    }
}

/// Default stream set
pub fn builtin_streams() -> Vec<StreamDefinition> {
    vec![
        StreamDefinition::new("cpu_usage", "CPU Usage", 10.0, 90.0, "%"),
        StreamDefinition::new("memory_usage", "Memory Usage", 20.0, 80.0, "%"),
        StreamDefinition::new("network_in", "Network In", 5.0, 50.0, "Mbps"),
        StreamDefinition::new("network_out", "Network Out", 5.0, 40.0, "Mbps"),
        StreamDefinition::new("disk_read", "Disk Read", 1.0, 30.0, "MB/s"),
        StreamDefinition::new("disk_write", "Disk Write", 1.0, 25.0, "MB/s"),
        StreamDefinition::new("tire_temperature", "Tire Temperature", 60.0, 120.0, "°C"),
    ]
}

#[derive(Debug, Clone)]
struct SimStream {
    key: String,
    min: f64,
    max: f64,
    step: f64,
    volatility: f64,
}

impl From<&StreamDefinition> for SimStream {
    fn from(def: &StreamDefinition) -> Self {
        Self {
            key: def.stream_key.clone(),
            min: def.min_value,
            max: def.max_value.max(def.min_value),
            step: def.span() * 0.05,
            volatility: def.span() * 0.1,
        }
    }
}

/// Random-walk generator for the visible catalog streams
pub struct Simulator {
    hub: Arc<TelemetryHub>,
    catalog: StreamCatalog,
    session_id: String,
    interval: Duration,
    streams: Vec<SimStream>,
    values: HashMap<String, f64>,
    rng: StdRng,
}

impl Simulator {
    pub fn new(hub: Arc<TelemetryHub>, catalog: StreamCatalog, interval: Duration) -> Self {
        Self {
            hub,
            catalog,
            session_id: format!("demo-session-{}", epoch_millis()),
            interval,
            streams: Vec::new(),
            values: HashMap::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for reproducible output
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Reload the catalog; on failure the previous stream set is kept
    pub fn refresh(&mut self) -> usize {
        match self.catalog.load() {
            Ok(definitions) => {
                self.streams = definitions
                    .iter()
                    .filter(|def| def.is_visible)
                    .map(SimStream::from)
                    .collect();
                for stream in &self.streams {
                    if !self.values.contains_key(&stream.key) {
                        let start = stream.min + self.rng.gen::<f64>() * (stream.max - stream.min) * 0.5;
                        self.values.insert(stream.key.clone(), start);
                    }
                }
            }
            Err(e) => warn!(error = %e, "stream catalog refresh failed"),
        }
        self.streams.len()
    }

    /// Produce one raw point per active stream
    pub fn generate(&mut self, timestamp: DateTime<Utc>) -> Vec<Value> {
        let mut points = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            let current = self.values.entry(stream.key.clone()).or_insert(stream.min);
            let trend = self.rng.gen_range(-1.0..=1.0) * stream.step;
            *current = (*current + trend).clamp(stream.min, stream.max);

            let noise = self.rng.gen_range(-1.0..=1.0) * stream.volatility;
            let spike = if self.rng.gen_bool(SPIKE_CHANCE) {
                self.rng.gen_range(-1.0..=1.0) * stream.volatility * 2.0
            } else {
                0.0
            };
            let value = (*current + noise + spike).clamp(stream.min, stream.max);
            let value = (value * 10.0).round() / 10.0;

            points.push(json!({
                "streamKey": stream.key,
                "value": value,
                "timestamp": timestamp.to_rfc3339(),
                "sessionId": self.session_id,
            }));
        }
        points
    }

    /// Generate and ingest one round of points
    pub fn tick(&mut self) -> usize {
        let points = self.generate(now());
        if points.is_empty() {
            return 0;
        }
        self.hub.ingest(IngestPayload::Many(points))
    }

    /// Run the simulator until the handle is stopped
    pub fn spawn(mut self) -> SimulationHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let streams = self.refresh();
            info!(session = %self.session_id, streams, "telemetry simulation started");

            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut refresher = interval(CATALOG_REFRESH);
            refresher.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = refresher.tick() => {
                        self.refresh();
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            info!(session = %self.session_id, "telemetry simulation stopped");
        });

        SimulationHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running [`Simulator`]
pub struct SimulationHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SimulationHandle {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}
