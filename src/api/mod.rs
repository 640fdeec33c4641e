//! API module for HTTP and WebSocket endpoints
//!
//! This module serves the live telemetry WebSocket plus a small REST surface
//! for health, statistics and HTTP ingest.

pub mod http;
pub mod websocket;

pub use http::create_router;
pub use websocket::AppState;
