//! WebSocket module for live telemetry
//!
//! Provides the `/ws` endpoint. Each socket is one registry connection:
//! - `subscribe` joins a session and seeds the client with a snapshot
//! - `ingest` feeds points into the pipeline
//! - outbound messages arrive through the connection's transport queue

pub mod handler;
pub mod state;

pub use state::AppState;
