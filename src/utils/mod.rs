//! Utility modules

pub mod ids;
pub mod time;

pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use time::{epoch_millis, now, parse_timestamp};
