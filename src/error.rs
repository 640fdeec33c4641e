//! Error types for the telemetry relay

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::types::ConnectionId;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors surfaced by the relay core
#[derive(Debug, Error)]
pub enum RelayError {
    /// Bad subscribe payload; returned to the caller in the ack
    #[error("{0}")]
    Validation(String),

    /// Event from a connection the registry does not know
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an ingested point was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPoint {
    #[error("point is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}
