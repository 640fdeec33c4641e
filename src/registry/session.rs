//! Session membership index

use std::collections::{HashMap, HashSet};

use crate::types::ConnectionId;

/// Maps session ids to the connections currently viewing them
///
/// Sessions exist only while they have members: the last `leave` removes
/// the entry.
#[derive(Debug, Default)]
pub struct SessionIndex {
    sessions: HashMap<String, HashSet<ConnectionId>>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a session, creating the session if needed
    ///
    /// Returns false if the connection was already a member.
    pub fn join(&mut self, session_id: &str, connection_id: &ConnectionId) -> bool {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(connection_id.clone())
    }

    /// Remove a connection from a session
    ///
    /// Returns false if it was not a member.
    pub fn leave(&mut self, session_id: &str, connection_id: &ConnectionId) -> bool {
        let Some(members) = self.sessions.get_mut(session_id) else {
            return false;
        };
        let removed = members.remove(connection_id);
        if members.is_empty() {
            self.sessions.remove(session_id);
        }
        removed
    }

    /// Members of a session; unknown sessions are empty
    pub fn members_of(&self, session_id: &str) -> HashSet<ConnectionId> {
        self.sessions.get(session_id).cloned().unwrap_or_default()
    }

    /// Borrowing iterator over members
    pub fn members(&self, session_id: &str) -> impl Iterator<Item = &ConnectionId> {
        self.sessions.get(session_id).into_iter().flatten()
    }

    pub fn contains_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
