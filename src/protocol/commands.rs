//! Inbound command types for the messaging coordinator
//!
//! Everything a connected client can ask the coordinator to do. Disconnects
//! are not a command; they arrive from the transport and map to
//! `Coordinator::disconnect`.

use serde::{Deserialize, Serialize};

use super::events::{Attachment, ConnectionId, MessageId, RoomName};

/// Commands consumed by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Bind a display name to this connection and come online
    Identify { display_name: String },
    /// Join a room, creating it if absent
    JoinRoom { room: RoomName },
    /// Leave a room
    LeaveRoom { room: RoomName },
    /// Join the private room shared with another display name
    JoinPrivateRoom { peer: String },
    /// Send a message to a room (default room when omitted)
    SendMessage {
        body: Option<String>,
        room: Option<RoomName>,
        attachment: Option<Attachment>,
    },
    /// Send a direct message to another connection
    SendPrivateMessage {
        to: ConnectionId,
        body: Option<String>,
        attachment: Option<Attachment>,
    },
    /// Start or stop the typing indicator in a room
    SetTyping {
        is_typing: bool,
        room: Option<RoomName>,
    },
    /// Mark a message as read by this participant
    MarkRead { message_id: MessageId },
    /// Attach a reaction to a message
    React { message_id: MessageId, kind: String },
    /// Request the list of known rooms
    ListRooms,
}

impl ClientCommand {
    /// Wire name of this command, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Identify { .. } => "identify",
            ClientCommand::JoinRoom { .. } => "join_room",
            ClientCommand::LeaveRoom { .. } => "leave_room",
            ClientCommand::JoinPrivateRoom { .. } => "join_private_room",
            ClientCommand::SendMessage { .. } => "send_message",
            ClientCommand::SendPrivateMessage { .. } => "send_private_message",
            ClientCommand::SetTyping { .. } => "set_typing",
            ClientCommand::MarkRead { .. } => "mark_read",
            ClientCommand::React { .. } => "react",
            ClientCommand::ListRooms => "list_rooms",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_identify() {
        let cmd = ClientCommand::Identify {
            display_name: "alice".to_string(),
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"identify\""));

        let decoded: ClientCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn test_deserialize_send_message_defaults() {
        // Clients may omit body, room, and attachment independently.
        let json = r#"{"type":"send_message","body":"hi","room":null,"attachment":null}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();

        match cmd {
            ClientCommand::SendMessage {
                body,
                room,
                attachment,
            } => {
                assert_eq!(body.as_deref(), Some("hi"));
                assert!(room.is_none());
                assert!(attachment.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_set_typing() {
        let json = r#"{"type":"set_typing","is_typing":true,"room":"team"}"#;
        let cmd: ClientCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SetTyping {
                is_typing: true,
                room: Some("team".to_string()),
            }
        );
    }

    #[test]
    fn test_command_names_match_wire_tags() {
        let cmd = ClientCommand::React {
            message_id: 9,
            kind: "like".to_string(),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", cmd.name())));
    }
}
