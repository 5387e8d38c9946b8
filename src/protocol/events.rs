//! Outbound event types for the messaging coordinator
//!
//! All payloads that can be delivered to connected clients. Uses serde for
//! JSON serialization over whatever transport is plugged in at the boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unique identifier types
pub type ConnectionId = String;
pub type MessageId = u64;
pub type RoomName = String;

/// An inline file attachment carried by a message
///
/// `data` is the payload as a data-URL string; the coordinator treats it as
/// opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name
    pub name: String,
    /// MIME type
    pub media_type: String,
    /// Inline payload
    pub data: String,
}

/// A stored chat message
///
/// Immutable after creation except `read_by` and `reactions`, which only
/// grow and never admit the same name twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Globally unique, monotonically increasing id
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
    /// Sender connection id
    pub sender_connection: ConnectionId,
    /// Body text (optional when an attachment is present)
    pub body: Option<String>,
    /// Optional inline attachment
    pub attachment: Option<Attachment>,
    /// Creation timestamp (Unix ms)
    pub timestamp: u64,
    /// Room this message belongs to
    pub room: RoomName,
    /// Whether this is a private-conversation message
    pub private: bool,
    /// Display names that have read this message
    pub read_by: Vec<String>,
    /// Reaction kind -> display names that reacted with it
    pub reactions: HashMap<String, Vec<String>>,
}

/// One entry of the presence list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Connection id
    pub connection_id: ConnectionId,
    /// Display name
    pub display_name: String,
}

/// Events delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full presence list (sent after every join/leave)
    PresenceList { users: Vec<PresenceEntry> },
    /// A participant identified and came online
    PresenceJoined {
        display_name: String,
        connection_id: ConnectionId,
    },
    /// A participant disconnected
    PresenceLeft {
        display_name: String,
        connection_id: ConnectionId,
    },
    /// Acknowledgment of a room join, sent to the requester only
    RoomJoined { room: RoomName },
    /// Acknowledgment of a room leave, sent to the requester only
    RoomLeft { room: RoomName },
    /// Recent history of a room, sent to the requester only, oldest-first
    RoomHistory {
        room: RoomName,
        messages: Vec<MessageRecord>,
    },
    /// A new message in a room, fanned out to its members
    RoomMessage { message: MessageRecord },
    /// A direct message, delivered to sender and addressee only
    PrivateMessage { message: MessageRecord },
    /// Snapshot of who is typing in a room
    TypingNames {
        room: RoomName,
        names: Vec<String>,
    },
    /// A reader was added to a message's read set
    ReadReceipt {
        message_id: MessageId,
        reader: String,
    },
    /// A reactor was added under a reaction kind
    ReactionUpdate {
        message_id: MessageId,
        kind: String,
        reactor: String,
    },
    /// Known room names, on demand
    RoomList { rooms: Vec<RoomName> },
    /// Local rejection notice for the offending connection
    Notice { code: u32, message: String },
}

impl ServerEvent {
    /// Wire name of this event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PresenceList { .. } => "presence_list",
            ServerEvent::PresenceJoined { .. } => "presence_joined",
            ServerEvent::PresenceLeft { .. } => "presence_left",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::RoomLeft { .. } => "room_left",
            ServerEvent::RoomHistory { .. } => "room_history",
            ServerEvent::RoomMessage { .. } => "room_message",
            ServerEvent::PrivateMessage { .. } => "private_message",
            ServerEvent::TypingNames { .. } => "typing_names",
            ServerEvent::ReadReceipt { .. } => "read_receipt",
            ServerEvent::ReactionUpdate { .. } => "reaction_update",
            ServerEvent::RoomList { .. } => "room_list",
            ServerEvent::Notice { .. } => "notice",
        }
    }
}

/// Recipient set of one outbound delivery
///
/// Room fan-outs are resolved to explicit connection lists when the plan is
/// produced, so later membership changes cannot alter it.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipients {
    /// Every attached connection
    All,
    /// A single connection
    One(ConnectionId),
    /// An explicit list of connections
    Many(Vec<ConnectionId>),
}

impl Recipients {
    /// Whether the given connection is covered by this recipient set
    ///
    /// `All` matches unconditionally; attachment is checked at send time.
    pub fn covers(&self, connection_id: &str) -> bool {
        match self {
            Recipients::All => true,
            Recipients::One(id) => id == connection_id,
            Recipients::Many(ids) => ids.iter().any(|id| id == connection_id),
        }
    }
}

/// One planned outbound delivery: an event and who receives it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Recipient set
    pub to: Recipients,
    /// Event to deliver
    pub event: ServerEvent,
}

impl Delivery {
    /// Deliver to every attached connection
    pub fn to_all(event: ServerEvent) -> Self {
        Self {
            to: Recipients::All,
            event,
        }
    }

    /// Deliver to a single connection
    pub fn to_one(connection_id: impl Into<ConnectionId>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::One(connection_id.into()),
            event,
        }
    }

    /// Deliver to an explicit list of connections
    pub fn to_many(connection_ids: Vec<ConnectionId>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Many(connection_ids),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_room_message_event() {
        let event = ServerEvent::RoomMessage {
            message: MessageRecord {
                id: 7,
                sender: "alice".to_string(),
                sender_connection: "c1".to_string(),
                body: Some("hello".to_string()),
                attachment: None,
                timestamp: 1234567890,
                room: "global".to_string(),
                private: false,
                read_by: vec![],
                reactions: HashMap::new(),
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"room_message\""));

        let decoded: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_serialize_typing_names() {
        let event = ServerEvent::TypingNames {
            room: "team".to_string(),
            names: vec!["alice".to_string(), "bob".to_string()],
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"typing_names\""));
        assert!(json.contains("\"team\""));
    }

    #[test]
    fn test_attachment_round_trip() {
        let attachment = Attachment {
            name: "cat.png".to_string(),
            media_type: "image/png".to_string(),
            data: "data:image/png;base64,iVBORw0KGgo=".to_string(),
        };

        let json = serde_json::to_string(&attachment).unwrap();
        let decoded: Attachment = serde_json::from_str(&json).unwrap();
        assert_eq!(attachment, decoded);
    }

    #[test]
    fn test_recipients_covers() {
        assert!(Recipients::All.covers("anyone"));
        assert!(Recipients::One("c1".to_string()).covers("c1"));
        assert!(!Recipients::One("c1".to_string()).covers("c2"));

        let many = Recipients::Many(vec!["c1".to_string(), "c3".to_string()]);
        assert!(many.covers("c3"));
        assert!(!many.covers("c2"));
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let event = ServerEvent::ReadReceipt {
            message_id: 1,
            reader: "alice".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", event.name())));
    }
}
