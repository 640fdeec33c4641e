//! Ingest, fanout and buffered persistence
//!
//! ```text
//!              ┌──────────────► BroadcastFanout ──► Transport (immediate)
//! ingest() ────┤
//!              └──────────────► BatchWriter ──► drain ──► TelemetryStore
//!                                   ▲    (size trigger)       (spawned)
//!                                   └── FlushScheduler (timer trigger)
//! ```

pub mod buffer;
pub mod fanout;
pub mod flush;
pub mod ingest;
pub mod writer;

pub use buffer::BatchBuffer;
pub use fanout::BroadcastFanout;
pub use flush::{FlushHandle, FlushScheduler};
pub use ingest::IngestPipeline;
pub use writer::{BatchWriter, DrainTrigger, WriterStats};
