//! Outbound delivery capability
//!
//! The core never touches sockets. It hands messages to a [`Transport`],
//! which routes them to whatever is serving the connection.
//! [`ChannelTransport`] gives every connection a bounded queue that its
//! WebSocket task drains.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::protocol::ServerMessage;
use crate::types::ConnectionId;

/// Per-connection send failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("no transport route for connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("outbound queue full for connection {0}")]
    Full(ConnectionId),
}

/// Sends messages to individual connections
///
/// `send` must not block: a slow or dead connection fails its own send and
/// nothing else.
pub trait Transport: Send + Sync {
    fn send(&self, connection_id: &ConnectionId, message: ServerMessage) -> Result<(), TransportError>;

    /// Drop any per-connection resources once the connection is gone
    fn release(&self, _connection_id: &ConnectionId) {}
}

/// Transport backed by one bounded mpsc queue per connection
pub struct ChannelTransport {
    capacity: usize,
    routes: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Open a queue for a connection and return its receiving end
    pub fn attach(&self, connection_id: &ConnectionId) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.routes.write().insert(connection_id.clone(), tx);
        rx
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, connection_id: &ConnectionId, message: ServerMessage) -> Result<(), TransportError> {
        let routes = self.routes.read();
        let tx = routes
            .get(connection_id)
            .ok_or_else(|| TransportError::UnknownConnection(connection_id.clone()))?;

        tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full(connection_id.clone()),
            TrySendError::Closed(_) => TransportError::Closed(connection_id.clone()),
        })
    }

    fn release(&self, connection_id: &ConnectionId) {
        if self.routes.write().remove(connection_id).is_some() {
            debug!(connection = %connection_id, "transport route released");
        }
    }
}
