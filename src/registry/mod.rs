//! Connection registry
//!
//! Tracks live connections, their session membership and the stream keys
//! they subscribe to. All state sits behind one coarse lock; every
//! operation is a short synchronous step, so finer-grained locking would
//! buy nothing.
//!
//! ```text
//!   ConnectionRegistry
//!   ┌──────────────────────────────────────┐
//!   │ connections: id -> ConnectionState   │
//!   │ sessions:    SessionIndex            │──► recipients(session, stream)
//!   │ streams:     key -> {id}             │
//!   └──────────────────────────────────────┘
//! ```

mod session;

pub use session::SessionIndex;

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{RelayError, RelayResult};
use crate::types::{ConnectionId, ConnectionPhase, ConnectionState};

#[derive(Debug, Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionState>,
    sessions: SessionIndex,
    streams: HashMap<String, HashSet<ConnectionId>>,
}

impl RegistryInner {
    fn unlink_streams(&mut self, connection_id: &ConnectionId, keys: &[String]) {
        for key in keys {
            if let Some(subscribers) = self.streams.get_mut(key) {
                subscribers.remove(connection_id);
                if subscribers.is_empty() {
                    self.streams.remove(key);
                }
            }
        }
    }
}

/// Registry of live connections and their subscriptions
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly established connection
    ///
    /// Registering an id twice keeps the existing state.
    pub fn register(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write();
        if inner.connections.contains_key(&connection_id) {
            debug!(connection = %connection_id, "connection already registered");
            return;
        }
        inner
            .connections
            .insert(connection_id.clone(), ConnectionState::new(connection_id));
    }

    /// Replace a connection's session and stream subscriptions
    ///
    /// The connection leaves any previous session. The stream set is
    /// replaced, never merged.
    pub fn set_subscription(
        &self,
        connection_id: &ConnectionId,
        session_id: &str,
        stream_keys: Vec<String>,
    ) -> RelayResult<ConnectionState> {
        if session_id.trim().is_empty() {
            return Err(RelayError::Validation("sessionId is required".to_string()));
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let (previous_session, previous_keys) = match inner.connections.get_mut(connection_id) {
            Some(state) => (
                state.session_id.take(),
                std::mem::take(&mut state.stream_keys),
            ),
            None => return Err(RelayError::UnknownConnection(connection_id.clone())),
        };

        if let Some(previous) = previous_session.as_deref() {
            inner.sessions.leave(previous, connection_id);
        }
        inner.unlink_streams(connection_id, &previous_keys);

        inner.sessions.join(session_id, connection_id);
        for key in &stream_keys {
            inner
                .streams
                .entry(key.clone())
                .or_default()
                .insert(connection_id.clone());
        }

        let state = inner
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RelayError::UnknownConnection(connection_id.clone()))?;
        state.session_id = Some(session_id.to_string());
        state.stream_keys = stream_keys;
        state.phase = ConnectionPhase::Subscribed;

        info!(
            connection = %connection_id,
            session = session_id,
            previous_session = ?previous_session,
            streams = state.stream_keys.len(),
            "connection subscribed"
        );

        Ok(state.clone())
    }

    /// Forget a connection; unknown ids are a no-op
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionState> {
        let mut inner = self.inner.write();
        let state = inner.connections.remove(connection_id)?;

        if let Some(session_id) = state.session_id.as_deref() {
            inner.sessions.leave(session_id, connection_id);
        }
        inner.unlink_streams(connection_id, &state.stream_keys);

        debug!(connection = %connection_id, session = ?state.session_id, "connection removed");
        Some(state)
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<ConnectionState> {
        self.inner.read().connections.get(connection_id).cloned()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.inner.read().connections.contains_key(connection_id)
    }

    pub fn members_of(&self, session_id: &str) -> HashSet<ConnectionId> {
        self.inner.read().sessions.members_of(session_id)
    }

    /// Connections that should receive a point
    ///
    /// Union of the session's members and the stream's direct subscribers,
    /// each connection listed once, in id order.
    pub fn recipients(&self, session_id: &str, stream_key: &str) -> Vec<ConnectionId> {
        let inner = self.inner.read();
        let mut recipients: BTreeSet<&ConnectionId> = inner.sessions.members(session_id).collect();
        if let Some(subscribers) = inner.streams.get(stream_key) {
            recipients.extend(subscribers.iter());
        }
        recipients.into_iter().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.session_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_subscribe_updates_session_and_streams() {
        let registry = ConnectionRegistry::new();
        let c = ConnectionId::from("c1");
        registry.register(c.clone());

        let state = registry.set_subscription(&c, "s1", keys(&["cpu", "mem"])).unwrap();
        assert_eq!(state.phase, ConnectionPhase::Subscribed);
        assert!(registry.members_of("s1").contains(&c));
        assert_eq!(registry.lookup(&c).unwrap().stream_keys, keys(&["cpu", "mem"]));
    }

    #[test]
    fn test_empty_session_is_validation_error() {
        let registry = ConnectionRegistry::new();
        let c = ConnectionId::from("c1");
        registry.register(c.clone());

        let err = registry.set_subscription(&c, "", keys(&["cpu"])).unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
        let state = registry.lookup(&c).unwrap();
        assert_eq!(state.phase, ConnectionPhase::Connected);
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_unknown_connection_rejected() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .set_subscription(&ConnectionId::from("ghost"), "s1", vec![])
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownConnection(_)));
    }

    #[test]
    fn test_resubscribe_moves_session_and_replaces_streams() {
        let registry = ConnectionRegistry::new();
        let c = ConnectionId::from("c1");
        registry.register(c.clone());

        registry.set_subscription(&c, "s1", keys(&["cpu"])).unwrap();
        registry.set_subscription(&c, "s2", keys(&["mem"])).unwrap();

        assert!(registry.members_of("s1").is_empty());
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.lookup(&c).unwrap().stream_keys, keys(&["mem"]));
        assert!(registry.recipients("other", "cpu").is_empty());
        assert_eq!(registry.recipients("other", "mem"), vec![c]);
    }

    #[test]
    fn test_recipients_deduplicate_both_routes() {
        let registry = ConnectionRegistry::new();
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        registry.register(a.clone());
        registry.register(b.clone());

        registry.set_subscription(&a, "s1", keys(&["cpu"])).unwrap();
        registry.set_subscription(&b, "s2", keys(&["cpu"])).unwrap();

        assert_eq!(registry.recipients("s1", "cpu"), vec![a.clone(), b]);
        assert_eq!(registry.recipients("s1", "mem"), vec![a]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let c = ConnectionId::from("c1");
        registry.register(c.clone());
        registry.set_subscription(&c, "s1", keys(&["cpu"])).unwrap();

        assert!(registry.remove(&c).is_some());
        assert!(registry.remove(&c).is_none());
        assert!(registry.members_of("s1").is_empty());
        assert!(registry.recipients("s1", "cpu").is_empty());
        assert_eq!(registry.connection_count(), 0);
    }
}
