//! Time and timestamp utilities

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Current wall-clock time in UTC
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a client-supplied timestamp
///
/// Accepts RFC 3339 strings and integral or fractional epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", s, e)),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .ok_or_else(|| format!("timestamp {} out of range", n))?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| format!("timestamp {} out of range", millis))
        }
        other => Err(format!("unsupported timestamp type: {}", other)),
    }
}
