//! Shared application state for HTTP and WebSocket handlers

use std::sync::Arc;
use std::time::Instant;

use crate::hub::TelemetryHub;
use crate::transport::ChannelTransport;

pub struct AppState {
    /// Relay core
    pub hub: Arc<TelemetryHub>,

    /// Per-connection outbound queues; the same transport the hub sends through
    pub transport: Arc<ChannelTransport>,

    pub started_at: Instant,
}

impl AppState {
    pub fn new(hub: Arc<TelemetryHub>, transport: Arc<ChannelTransport>) -> Self {
        Self {
            hub,
            transport,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
