//! Wire protocol types for telemetry clients
//!
//! This module contains the JSON messages exchanged over the WebSocket.

mod messages;

pub use messages::{ClientMessage, ServerMessage, SubscribeAck, SubscribeRequest, UpdatePayload};
