//! Stream definitions from the external catalog

use serde::{Deserialize, Serialize};

/// Read-only description of one telemetry stream
///
/// Only the demo simulator reads these; routing never depends on them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDefinition {
    pub stream_key: String,
    pub name: String,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_max_value() -> f64 {
    100.0
}

fn default_visible() -> bool {
    true
}

impl StreamDefinition {
    pub fn new(stream_key: &str, name: &str, min_value: f64, max_value: f64, unit: &str) -> Self {
        Self {
            stream_key: stream_key.to_string(),
            name: name.to_string(),
            min_value,
            max_value,
            unit: unit.to_string(),
            is_visible: true,
        }
    }

    /// Width of the value range, never negative
    pub fn span(&self) -> f64 {
        (self.max_value - self.min_value).max(0.0)
    }
}
