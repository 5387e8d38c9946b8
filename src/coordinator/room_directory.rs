//! Room directory: known rooms and their member sets
//!
//! Rooms are created lazily on first join or first message and never
//! destroyed; an empty room persists so returning participants find their
//! history where they left it. A dual index (room -> members and
//! connection -> rooms) keeps disconnect cleanup cheap, mirroring the
//! membership bookkeeping in the rest of the coordinator.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::protocol::events::{ConnectionId, RoomName};

/// Separator and prefix for derived private room names
const PRIVATE_ROOM_PREFIX: &str = "private_";
const PRIVATE_ROOM_SEPARATOR: &str = "_";

/// Directory of rooms and memberships
pub struct RoomDirectory {
    /// Room name -> member connection ids
    rooms: RwLock<HashMap<RoomName, HashSet<ConnectionId>>>,
    /// Connection id -> rooms it has joined
    memberships: RwLock<HashMap<ConnectionId, HashSet<RoomName>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Create a directory pre-seeded with the always-present default room
    pub fn with_default_room(room: &str) -> Self {
        let mut rooms = HashMap::new();
        rooms.insert(room.to_string(), HashSet::new());
        Self {
            rooms: RwLock::new(rooms),
            memberships: RwLock::new(HashMap::new()),
        }
    }

    /// Derive the private room name shared by two display names
    ///
    /// The two names are sorted before joining, so both participants address
    /// the same room regardless of who initiates.
    pub fn private_room_name(a: &str, b: &str) -> RoomName {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        format!(
            "{}{}{}{}",
            PRIVATE_ROOM_PREFIX, first, PRIVATE_ROOM_SEPARATOR, second
        )
    }

    /// Whether a room name was derived for a private conversation
    pub fn is_private_room_name(name: &str) -> bool {
        name.starts_with(PRIVATE_ROOM_PREFIX)
    }

    /// Create a room if it does not exist yet; idempotent
    pub async fn ensure_room(&self, room: &str) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room.to_string()).or_default();
    }

    /// Add a connection to a room, creating the room if absent
    ///
    /// Returns false if the connection was already a member.
    pub async fn join(&self, connection_id: &str, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let added = rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.to_string());

        if added {
            let mut memberships = self.memberships.write().await;
            memberships
                .entry(connection_id.to_string())
                .or_default()
                .insert(room.to_string());
        }
        added
    }

    /// Remove a connection from a room
    ///
    /// Returns false if it was not a member. The room itself persists.
    pub async fn leave(&self, connection_id: &str, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let removed = rooms
            .get_mut(room)
            .map(|members| members.remove(connection_id))
            .unwrap_or(false);

        if removed {
            let mut memberships = self.memberships.write().await;
            if let Some(joined) = memberships.get_mut(connection_id) {
                joined.remove(room);
            }
        }
        removed
    }

    /// Current members of a room
    pub async fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Rooms a connection has joined
    pub async fn rooms_of(&self, connection_id: &str) -> Vec<RoomName> {
        let memberships = self.memberships.read().await;
        memberships
            .get(connection_id)
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is a member of a room
    pub async fn is_member(&self, connection_id: &str, room: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    /// All known room names, sorted
    pub async fn room_names(&self) -> Vec<RoomName> {
        let rooms = self.rooms.read().await;
        let mut names: Vec<RoomName> = rooms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of known rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Strip a connection from every room it joined (disconnect path)
    ///
    /// Returns the affected room names.
    pub async fn remove_connection_everywhere(&self, connection_id: &str) -> Vec<RoomName> {
        let joined = {
            let mut memberships = self.memberships.write().await;
            memberships
                .remove(connection_id)
                .map(|rooms| rooms.into_iter().collect::<Vec<_>>())
                .unwrap_or_default()
        };

        let mut rooms = self.rooms.write().await;
        for room in &joined {
            if let Some(members) = rooms.get_mut(room) {
                members.remove(connection_id);
            }
        }
        joined
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_leave() {
        let directory = RoomDirectory::new();

        assert!(directory.join("c1", "team").await);
        assert!(!directory.join("c1", "team").await);
        assert!(directory.is_member("c1", "team").await);
        assert_eq!(directory.members_of("team").await, vec!["c1".to_string()]);

        assert!(directory.leave("c1", "team").await);
        assert!(!directory.leave("c1", "team").await);
        assert!(!directory.is_member("c1", "team").await);

        // The room persists after its last member leaves.
        assert_eq!(directory.room_names().await, vec!["team".to_string()]);
    }

    #[tokio::test]
    async fn test_ensure_room_idempotent() {
        let directory = RoomDirectory::new();

        directory.ensure_room("global").await;
        directory.ensure_room("global").await;
        assert_eq!(directory.room_count().await, 1);
        assert!(directory.members_of("global").await.is_empty());
    }

    #[test]
    fn test_private_room_name_order_independent() {
        let a = RoomDirectory::private_room_name("alice", "bob");
        let b = RoomDirectory::private_room_name("bob", "alice");
        assert_eq!(a, b);
        assert_eq!(a, "private_alice_bob");

        let same = RoomDirectory::private_room_name("zed", "zed");
        assert_eq!(same, "private_zed_zed");

        assert!(RoomDirectory::is_private_room_name(&a));
        assert!(!RoomDirectory::is_private_room_name("global"));
    }

    #[tokio::test]
    async fn test_remove_connection_everywhere() {
        let directory = RoomDirectory::new();

        directory.join("c1", "global").await;
        directory.join("c1", "team").await;
        directory.join("c2", "team").await;

        let mut affected = directory.remove_connection_everywhere("c1").await;
        affected.sort();
        assert_eq!(affected, vec!["global".to_string(), "team".to_string()]);

        assert!(!directory.is_member("c1", "global").await);
        assert!(!directory.is_member("c1", "team").await);
        assert!(directory.is_member("c2", "team").await);
        assert!(directory.rooms_of("c1").await.is_empty());
    }

    #[tokio::test]
    async fn test_rooms_of_reverse_index() {
        let directory = RoomDirectory::new();

        directory.join("c1", "global").await;
        directory.join("c1", "team").await;

        let mut joined = directory.rooms_of("c1").await;
        joined.sort();
        assert_eq!(joined, vec!["global".to_string(), "team".to_string()]);
    }
}
