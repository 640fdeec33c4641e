//! Client and server messages
//!
//! Frames are JSON objects tagged by `"type"`. Outbound telemetry events use
//! the `telemetry:initial` / `telemetry:update` names dashboards listen for.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, ConnectionState, IngestPayload, MetricPoint};

/// Messages sent from the relay to a connection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// First frame on every connection
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// Reply to a subscribe request
    #[serde(rename = "subscribe:ack")]
    SubscribeAck(SubscribeAck),

    /// Latest point per requested stream, sent once per subscribe
    #[serde(rename = "telemetry:initial")]
    Initial { points: Vec<MetricPoint> },

    /// Live data
    #[serde(rename = "telemetry:update")]
    Update { data: UpdatePayload },

    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Points carried by a telemetry message
    pub fn points(&self) -> &[MetricPoint] {
        match self {
            ServerMessage::Initial { points } => points,
            ServerMessage::Update { data } => data.as_slice(),
            _ => &[],
        }
    }
}

/// Body of a `telemetry:update`: a single point or several
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdatePayload {
    Many(Vec<MetricPoint>),
    One(MetricPoint),
}

impl UpdatePayload {
    pub fn as_slice(&self) -> &[MetricPoint] {
        match self {
            UpdatePayload::One(point) => std::slice::from_ref(point),
            UpdatePayload::Many(points) => points,
        }
    }
}

/// Subscribe acknowledgement
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubscribeAck {
    pub fn accepted(state: &ConnectionState) -> Self {
        Self {
            success: true,
            connection_id: Some(state.id.clone()),
            session_id: state.session_id.clone(),
            stream_keys: Some(state.stream_keys.clone()),
            error: None,
        }
    }

    pub fn rejected(error: impl ToString) -> Self {
        Self {
            success: false,
            connection_id: None,
            session_id: None,
            stream_keys: None,
            error: Some(error.to_string()),
        }
    }
}

/// Subscribe request body
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, alias = "streams")]
    pub stream_keys: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(session_id: &str, stream_keys: &[&str]) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            stream_keys: stream_keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Messages sent from a client to the relay
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe(SubscribeRequest),

    /// One point or a list of points
    Ingest { data: IngestPayload },

    /// Heartbeat
    Ping,
}
