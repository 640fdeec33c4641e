//! Telemetry Relay
//!
//! Distributes live numeric telemetry to connected viewers, grouped by
//! session, while persisting the same points to a time-series store in
//! batches that never hold up delivery.
//!
//! # Features
//!
//! - **Session routing**: a point reaches every viewer of its session and
//!   every direct subscriber of its stream, exactly once per viewer
//! - **Snapshot on subscribe**: new viewers get the latest point per stream
//! - **Batched persistence**: size- and timer-triggered drains share one
//!   atomic capture-and-clear, so no point is written twice
//! - **Bounded memory**: the pending buffer drops its oldest points at the cap
//!
//! # Modules
//!
//! - `types`: Core data structures (MetricPoint, ConnectionState, StreamDefinition)
//! - `protocol`: WebSocket message types
//! - `registry`: Connection registry and session index
//! - `pipeline`: Ingest, fanout, batch buffer, writer and flush scheduler
//! - `snapshot`: Latest-point lookup for new subscribers
//! - `store`: Persistence collaborators (memory, JSONL)
//! - `transport`: Outbound delivery capability
//! - `hub`: Wiring of all of the above
//! - `api`: Axum HTTP and WebSocket endpoints
//! - `simulation`: Demo data generator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use telemetry_relay::{ChannelTransport, MemoryStore, RelayConfig, TelemetryHub};
//! use telemetry_relay::api::{create_router, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::default();
//!     let transport = Arc::new(ChannelTransport::new(config.channel_capacity));
//!     let hub = Arc::new(TelemetryHub::new(&config, Arc::new(MemoryStore::new()), transport.clone()));
//!     let flush = hub.start_flush_scheduler();
//!
//!     let app = create_router(Arc::new(AppState::new(hub, transport)));
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//!     axum::serve(listener, app).await?;
//!     flush.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::RelayConfig;
pub use error::{MalformedPoint, RelayError, RelayResult};
pub use hub::{HubStats, TelemetryHub};
pub use protocol::{ClientMessage, ServerMessage, SubscribeAck, SubscribeRequest, UpdatePayload};
pub use registry::{ConnectionRegistry, SessionIndex};
pub use snapshot::SnapshotProvider;
pub use store::{JsonlStore, JsonlStoreConfig, MemoryStore, TelemetryStore};
pub use transport::{ChannelTransport, Transport, TransportError};
pub use types::{ConnectionId, ConnectionState, IngestPayload, MetricPoint, StreamDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
