//! Data types for the telemetry relay
//!
//! This module contains the core data structures shared by the registry,
//! the ingest pipeline and the storage backends.

mod connection;
mod point;
mod stream;

pub use connection::{ConnectionId, ConnectionPhase, ConnectionState};
pub use point::{IngestPayload, MetricPoint, RawPoint};
pub use stream::StreamDefinition;
