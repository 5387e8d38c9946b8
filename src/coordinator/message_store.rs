//! Message store: bounded per-room message logs
//!
//! Each room keeps an ordered log capped at a configurable bound; once the
//! bound is exceeded the oldest records are evicted from the front. Message
//! ids come from a single counter shared across all rooms, so an id alone is
//! enough to reference a message from read-receipt and reaction events.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

use crate::current_timestamp;
use crate::protocol::events::{Attachment, ConnectionId, MessageId, MessageRecord, RoomName};

/// The mutable inputs of a new message, before the store stamps id and time
#[derive(Debug, Clone)]
pub struct MessageDraft {
    /// Sender display name
    pub sender: String,
    /// Sender connection id
    pub sender_connection: ConnectionId,
    /// Body text
    pub body: Option<String>,
    /// Inline attachment
    pub attachment: Option<Attachment>,
    /// Target room
    pub room: RoomName,
    /// Whether this is a private-conversation message
    pub private: bool,
}

/// Per-room bounded message logs plus the shared id counter
pub struct MessageStore {
    /// Room name -> ordered log, oldest first
    logs: RwLock<HashMap<RoomName, VecDeque<MessageRecord>>>,
    /// Next message id, shared across all rooms
    next_message_id: RwLock<MessageId>,
    /// Per-room capacity bound
    capacity: usize,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            next_message_id: RwLock::new(1),
            capacity,
        }
    }

    /// Append a message to its room's log
    ///
    /// Assigns the next globally unique id, stamps the creation time, and
    /// evicts from the front while the log exceeds the capacity bound. The
    /// completed record is returned for fan-out.
    pub async fn append(&self, draft: MessageDraft) -> MessageRecord {
        let id = {
            let mut next = self.next_message_id.write().await;
            let id = *next;
            *next += 1;
            id
        };

        let record = MessageRecord {
            id,
            sender: draft.sender,
            sender_connection: draft.sender_connection,
            body: draft.body,
            attachment: draft.attachment,
            timestamp: current_timestamp(),
            room: draft.room.clone(),
            private: draft.private,
            read_by: Vec::new(),
            reactions: HashMap::new(),
        };

        let mut logs = self.logs.write().await;
        let log = logs.entry(draft.room).or_default();
        log.push_back(record.clone());
        while log.len() > self.capacity {
            log.pop_front();
        }

        record
    }

    /// Page through a room's history, oldest-first
    ///
    /// Returns up to `limit` records strictly older than `before_id`, or the
    /// most recent `limit` when `before_id` is absent. Repeating the call
    /// with the first returned id as the new cursor walks backwards without
    /// overlap.
    pub async fn history(
        &self,
        room: &str,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> Vec<MessageRecord> {
        let logs = self.logs.read().await;
        let Some(log) = logs.get(room) else {
            return Vec::new();
        };

        let selected: Vec<MessageRecord> = match before_id {
            Some(bound) => log.iter().filter(|m| m.id < bound).cloned().collect(),
            None => log.iter().cloned().collect(),
        };

        let skip = selected.len().saturating_sub(limit);
        selected[skip..].to_vec()
    }

    /// Find a message by id, scanning across all rooms
    ///
    /// Private threads are rooms too, so this covers every message in the
    /// system.
    pub async fn find_by_id(&self, id: MessageId) -> Option<MessageRecord> {
        let logs = self.logs.read().await;
        logs.values()
            .flat_map(|log| log.iter())
            .find(|m| m.id == id)
            .cloned()
    }

    /// Apply a mutation to a stored message
    ///
    /// Returns `None` when the id is unknown, otherwise the closure's result
    /// (used by the annotation tracker to report whether anything changed).
    pub(crate) async fn update_message<F>(&self, id: MessageId, apply: F) -> Option<bool>
    where
        F: FnOnce(&mut MessageRecord) -> bool,
    {
        let mut logs = self.logs.write().await;
        logs.values_mut()
            .flat_map(|log| log.iter_mut())
            .find(|m| m.id == id)
            .map(apply)
    }

    /// Number of messages currently retained for a room
    pub async fn room_len(&self, room: &str) -> usize {
        let logs = self.logs.read().await;
        logs.get(room).map(|log| log.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(room: &str, body: &str) -> MessageDraft {
        MessageDraft {
            sender: "alice".to_string(),
            sender_connection: "c1".to_string(),
            body: Some(body.to_string()),
            attachment: None,
            room: room.to_string(),
            private: false,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_ids() {
        let store = MessageStore::new(100);

        let first = store.append(draft("global", "one")).await;
        let second = store.append(draft("team", "two")).await;
        let third = store.append(draft("global", "three")).await;

        // Ids are unique and increasing across rooms, not per room.
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(third.id, 3);
        assert!(first.timestamp > 0);
        assert!(first.read_by.is_empty());
        assert!(first.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let store = MessageStore::new(100);

        let first = store.append(draft("global", "msg 0")).await;
        for i in 1..101 {
            store.append(draft("global", &format!("msg {}", i))).await;
        }

        assert_eq!(store.room_len("global").await, 100);

        let history = store.history("global", None, 200).await;
        assert_eq!(history.len(), 100);
        assert!(history.iter().all(|m| m.id != first.id));

        // Oldest-first, ascending ids, no reordering from eviction.
        let ids: Vec<MessageId> = history.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids[0], first.id + 1);
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let store = MessageStore::new(100);
        for i in 0..10 {
            store.append(draft("global", &format!("msg {}", i))).await;
        }

        let newest = store.history("global", None, 4).await;
        let ids: Vec<MessageId> = newest.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![7, 8, 9, 10]);

        // Walk backwards from the oldest id of the previous page.
        let older = store.history("global", Some(7), 4).await;
        let ids: Vec<MessageId> = older.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 4, 5, 6]);

        let oldest = store.history("global", Some(3), 4).await;
        let ids: Vec<MessageId> = oldest.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(store.history("global", Some(1), 4).await.is_empty());
        assert!(store.history("nowhere", None, 4).await.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_across_rooms() {
        let store = MessageStore::new(100);

        store.append(draft("global", "in global")).await;
        let team = store.append(draft("team", "in team")).await;

        let found = store.find_by_id(team.id).await.unwrap();
        assert_eq!(found.room, "team");
        assert_eq!(found.body.as_deref(), Some("in team"));
        assert!(store.find_by_id(999).await.is_none());
    }

    #[tokio::test]
    async fn test_update_message() {
        let store = MessageStore::new(100);
        let record = store.append(draft("global", "hello")).await;

        let changed = store
            .update_message(record.id, |m| {
                m.read_by.push("bob".to_string());
                true
            })
            .await;
        assert_eq!(changed, Some(true));

        let found = store.find_by_id(record.id).await.unwrap();
        assert_eq!(found.read_by, vec!["bob".to_string()]);

        assert!(store.update_message(999, |_| true).await.is_none());
    }
}
