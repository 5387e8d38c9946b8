//! Session registry: source of truth for who is online
//!
//! Maps an active connection to its display identity. Registration and
//! removal deliberately perform no broadcasting; the router owns fan-out.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::current_timestamp;
use crate::error::{ChatError, Result};
use crate::protocol::events::{ConnectionId, PresenceEntry};

/// Server-side state for one identified participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Connection id (opaque, transport-supplied)
    pub connection_id: ConnectionId,
    /// Display name, assigned once at identify and immutable afterwards
    pub display_name: String,
    /// When the session was registered (Unix ms)
    pub joined_at: u64,
    /// Registration order, stable under equal timestamps
    seq: u64,
}

impl Session {
    pub fn to_presence_entry(&self) -> PresenceEntry {
        PresenceEntry {
            connection_id: self.connection_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Registry of identified sessions, keyed by connection id
pub struct SessionRegistry {
    /// Sessions indexed by connection id
    sessions: RwLock<HashMap<ConnectionId, Session>>,
    /// Next registration sequence number
    next_seq: RwLock<u64>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_seq: RwLock::new(1),
        }
    }

    /// Register a session for a connection
    ///
    /// Connection ids are supplied by the transport layer and assumed
    /// unique; registering one twice is a caller bug surfaced as
    /// `DuplicateConnection`.
    pub async fn register(&self, connection_id: &str, display_name: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(connection_id) {
            return Err(ChatError::duplicate_connection(connection_id));
        }

        let seq = {
            let mut next = self.next_seq.write().await;
            let seq = *next;
            *next += 1;
            seq
        };

        let session = Session {
            connection_id: connection_id.to_string(),
            display_name: display_name.to_string(),
            joined_at: current_timestamp(),
            seq,
        };
        sessions.insert(connection_id.to_string(), session.clone());
        Ok(session)
    }

    /// Look up a session by connection id
    pub async fn lookup(&self, connection_id: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(connection_id).cloned()
    }

    /// Resolve a connection id to its display name
    pub async fn display_name(&self, connection_id: &str) -> Option<String> {
        let sessions = self.sessions.read().await;
        sessions.get(connection_id).map(|s| s.display_name.clone())
    }

    /// Remove a session, returning it if it existed
    pub async fn unregister(&self, connection_id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(connection_id)
    }

    /// All active sessions, ordered by join time
    pub async fn list_active(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        let mut active: Vec<Session> = sessions.values().cloned().collect();
        active.sort_by_key(|s| s.seq);
        active
    }

    /// Presence snapshot for broadcasting, ordered by join time
    pub async fn presence_entries(&self) -> Vec<PresenceEntry> {
        self.list_active()
            .await
            .iter()
            .map(Session::to_presence_entry)
            .collect()
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = SessionRegistry::new();

        let session = registry.register("c1", "alice").await.unwrap();
        assert_eq!(session.connection_id, "c1");
        assert_eq!(session.display_name, "alice");
        assert!(session.joined_at > 0);

        let found = registry.lookup("c1").await.unwrap();
        assert_eq!(found, session);
        assert_eq!(registry.display_name("c1").await.as_deref(), Some("alice"));
        assert!(registry.lookup("c2").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_connection_rejected() {
        let registry = SessionRegistry::new();

        registry.register("c1", "alice").await.unwrap();
        let err = registry.register("c1", "bob").await.unwrap_err();
        assert!(matches!(err, ChatError::DuplicateConnection(_)));

        // The original registration is untouched.
        assert_eq!(registry.display_name("c1").await.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_list_active_ordered_by_join_time() {
        let registry = SessionRegistry::new();

        registry.register("c2", "bob").await.unwrap();
        registry.register("c1", "alice").await.unwrap();
        registry.register("c3", "carol").await.unwrap();

        let names: Vec<String> = registry
            .list_active()
            .await
            .into_iter()
            .map(|s| s.display_name)
            .collect();
        assert_eq!(names, vec!["bob", "alice", "carol"]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = SessionRegistry::new();

        registry.register("c1", "alice").await.unwrap();
        assert_eq!(registry.len().await, 1);

        let removed = registry.unregister("c1").await.unwrap();
        assert_eq!(removed.display_name, "alice");
        assert!(registry.is_empty().await);
        assert!(registry.unregister("c1").await.is_none());
    }

}
