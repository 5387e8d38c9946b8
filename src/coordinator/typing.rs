//! Typing tracker: who is currently typing in each room
//!
//! Entries appear on an explicit typing-start signal and disappear on the
//! matching stop signal or on disconnect. Debounce timers live on the client
//! side; this component owns no timers and trusts the caller's stop events.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::protocol::events::{ConnectionId, RoomName};

/// Per-room map of connection id -> display name of whoever is typing
pub struct TypingTracker {
    typing: RwLock<HashMap<RoomName, HashMap<ConnectionId, String>>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self {
            typing: RwLock::new(HashMap::new()),
        }
    }

    /// Record a typing start/stop signal
    ///
    /// Returns true when the room's snapshot actually changed.
    pub async fn set_typing(
        &self,
        connection_id: &str,
        room: &str,
        display_name: &str,
        is_typing: bool,
    ) -> bool {
        let mut typing = self.typing.write().await;
        if is_typing {
            typing
                .entry(room.to_string())
                .or_default()
                .insert(connection_id.to_string(), display_name.to_string())
                .is_none()
        } else {
            let Some(entries) = typing.get_mut(room) else {
                return false;
            };
            let removed = entries.remove(connection_id).is_some();
            if entries.is_empty() {
                typing.remove(room);
            }
            removed
        }
    }

    /// Display names currently typing in a room, sorted for stable snapshots
    pub async fn typing_names(&self, room: &str) -> Vec<String> {
        let typing = self.typing.read().await;
        let mut names: Vec<String> = typing
            .get(room)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Drop a connection from every room's typing set (disconnect path)
    ///
    /// Returns the affected room names so the caller can rebroadcast each
    /// room's refreshed snapshot.
    pub async fn clear_connection(&self, connection_id: &str) -> Vec<RoomName> {
        let mut typing = self.typing.write().await;
        let mut affected = Vec::new();

        typing.retain(|room, entries| {
            if entries.remove(connection_id).is_some() {
                affected.push(room.clone());
            }
            !entries.is_empty()
        });

        affected
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}
