//! Telemetry point types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::MalformedPoint;
use crate::utils::parse_timestamp;

/// A validated telemetry sample
///
/// Immutable once built. Duplicates are legal and never collapsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub id: String,
    pub stream_key: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// A point as received from a producer, before validation
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    #[serde(default)]
    pub stream_key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub session_id: Option<Value>,
}

impl RawPoint {
    /// Read a raw point out of an arbitrary JSON value
    pub fn from_json(value: &Value) -> Result<Self, MalformedPoint> {
        if !value.is_object() {
            return Err(MalformedPoint::NotAnObject);
        }
        serde_json::from_value(value.clone()).map_err(|_| MalformedPoint::NotAnObject)
    }

    /// Validate and stamp the point
    ///
    /// `now` fills a missing timestamp, `id` becomes the point id.
    pub fn validate(self, now: DateTime<Utc>, id: String) -> Result<MetricPoint, MalformedPoint> {
        let stream_key = required_string(self.stream_key, "streamKey")?;
        let session_id = required_string(self.session_id, "sessionId")?;

        let value = match self.value {
            None | Some(Value::Null) => return Err(MalformedPoint::MissingField("value")),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        }
        .filter(|v| v.is_finite())
        .ok_or(MalformedPoint::InvalidField {
            field: "value",
            reason: "expected a finite number".to_string(),
        })?;

        let timestamp = match self.timestamp {
            None | Some(Value::Null) => now,
            Some(Value::String(s)) if s.trim().is_empty() => now,
            Some(raw) => parse_timestamp(&raw).map_err(|reason| MalformedPoint::InvalidField {
                field: "timestamp",
                reason,
            })?,
        };

        Ok(MetricPoint {
            id,
            stream_key,
            value,
            timestamp,
            session_id,
        })
    }
}

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, MalformedPoint> {
    match value {
        None | Some(Value::Null) => Err(MalformedPoint::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(MalformedPoint::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(MalformedPoint::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
    }
}

/// Ingest payload: one point or a list of points
#[derive(Clone, Debug, PartialEq)]
pub enum IngestPayload {
    One(Value),
    Many(Vec<Value>),
}

impl IngestPayload {
    pub fn len(&self) -> usize {
        match self {
            IngestPayload::One(_) => 1,
            IngestPayload::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Value> for IngestPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => IngestPayload::Many(items),
            other => IngestPayload::One(other),
        }
    }
}

impl<'de> Deserialize<'de> for IngestPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(IngestPayload::from)
    }
}
