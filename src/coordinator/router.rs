//! Router/broadcaster: the coordinator's orchestration layer
//!
//! Classifies inbound commands, applies the corresponding mutation to the
//! session registry, room directory, message store, typing tracker, or
//! annotation tracker, and produces an explicit fan-out plan. The plan is a
//! plain return value: all mutation has completed by the time it exists, so
//! a slow recipient can never corrupt shared state for others.
//!
//! Each connection moves through a small state machine: `Connected`
//! (attached, no identity) -> `Identified` (display name bound, auto-joined
//! to the default room) -> `Disconnected` (terminal, everything purged).
//! Presence in the session registry is what distinguishes the first two.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::CoordinatorConfig;
use crate::current_timestamp;
use crate::coordinator::annotations::AnnotationTracker;
use crate::coordinator::message_store::{MessageDraft, MessageStore};
use crate::coordinator::room_directory::RoomDirectory;
use crate::coordinator::session_registry::{Session, SessionRegistry};
use crate::coordinator::typing::TypingTracker;
use crate::error::{ChatError, Result};
use crate::protocol::commands::ClientCommand;
use crate::protocol::events::{
    Attachment, ConnectionId, Delivery, MessageId, MessageRecord, PresenceEntry, Recipients,
    RoomName, ServerEvent,
};

/// Maximum accepted display name length
const MAX_DISPLAY_NAME_LEN: usize = 50;

/// An attached connection and its outbound channel
struct ConnectionEntry {
    /// Channel the transport drains towards this client
    outbound: mpsc::UnboundedSender<ServerEvent>,
    /// Attach time (Unix ms)
    connected_at: u64,
}

/// The presence & messaging coordinator
///
/// One instance is constructed at process start and handed by reference to
/// whatever transport feeds it; there is no ambient global state, so tests
/// run against isolated instances.
pub struct Coordinator {
    /// Coordinator configuration
    config: CoordinatorConfig,
    /// Who is online
    sessions: SessionRegistry,
    /// Known rooms and their member sets
    rooms: RoomDirectory,
    /// Bounded per-room message logs
    store: Arc<MessageStore>,
    /// Who is typing where
    typing: TypingTracker,
    /// Read receipts and reactions
    annotations: AnnotationTracker,
    /// Attached connections by connection id
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
}

impl Coordinator {
    /// Create a new coordinator
    pub fn new(config: CoordinatorConfig) -> Self {
        let store = Arc::new(MessageStore::new(config.room_history_cap));
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomDirectory::with_default_room(&config.default_room),
            annotations: AnnotationTracker::new(Arc::clone(&store)),
            typing: TypingTracker::new(),
            connections: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CoordinatorConfig::default())
    }

    /// The active configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // =========================================================================
    // Transport boundary
    // =========================================================================

    /// Register a new connection and its outbound channel
    ///
    /// Called by the transport once a connection is established. The
    /// connection starts in the `Connected` state and must identify before
    /// anything else.
    pub async fn attach(
        &self,
        connection_id: &str,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<()> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(ChatError::resource_limit(format!(
                "maximum connections reached: {}",
                self.config.max_connections
            )));
        }
        if connections.contains_key(connection_id) {
            return Err(ChatError::duplicate_connection(connection_id));
        }

        connections.insert(
            connection_id.to_string(),
            ConnectionEntry {
                outbound,
                connected_at: current_timestamp(),
            },
        );
        debug!("connection {} attached", connection_id);
        Ok(())
    }

    /// Apply a command and deliver the resulting events
    pub async fn handle(&self, connection_id: &str, command: ClientCommand) -> Vec<Delivery> {
        let deliveries = self.dispatch(connection_id, command).await;
        self.deliver(&deliveries).await;
        deliveries
    }

    /// Process a transport-originated disconnect and deliver the fallout
    pub async fn handle_disconnect(&self, connection_id: &str) -> Vec<Delivery> {
        let deliveries = self.disconnect(connection_id).await;
        self.deliver(&deliveries).await;
        deliveries
    }

    /// Detach every connection and drop their outbound channels
    pub async fn shutdown(&self) {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        connections.clear();
        info!("coordinator shut down, {} connections detached", count);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Classify and apply a command, returning the fan-out plan
    ///
    /// Never fails: error conditions are local to the offending connection
    /// and surface as either a logged no-op or a `Notice` delivery.
    pub async fn dispatch(&self, connection_id: &str, command: ClientCommand) -> Vec<Delivery> {
        debug!("dispatch {} from {}", command.name(), connection_id);

        if let ClientCommand::Identify { display_name } = &command {
            return self.handle_identify(connection_id, display_name.clone()).await;
        }

        // Everything else requires the Identified state.
        let session = match self.require_identified(connection_id, command.name()).await {
            Ok(session) => session,
            Err(deliveries) => return deliveries,
        };

        match command {
            ClientCommand::Identify { .. } => unreachable!("handled above"),
            ClientCommand::JoinRoom { room } => self.handle_join_room(&session, &room).await,
            ClientCommand::LeaveRoom { room } => self.handle_leave_room(&session, &room).await,
            ClientCommand::JoinPrivateRoom { peer } => {
                let room = RoomDirectory::private_room_name(&session.display_name, &peer);
                self.handle_join_room(&session, &room).await
            }
            ClientCommand::SendMessage {
                body,
                room,
                attachment,
            } => {
                self.handle_send_message(&session, body, room, attachment)
                    .await
            }
            ClientCommand::SendPrivateMessage {
                to,
                body,
                attachment,
            } => {
                self.handle_send_private_message(&session, &to, body, attachment)
                    .await
            }
            ClientCommand::SetTyping { is_typing, room } => {
                self.handle_set_typing(&session, room, is_typing).await
            }
            ClientCommand::MarkRead { message_id } => {
                self.handle_mark_read(&session, message_id).await
            }
            ClientCommand::React { message_id, kind } => {
                self.handle_react(&session, message_id, &kind).await
            }
            ClientCommand::ListRooms => {
                let rooms = self.room_names().await;
                vec![Delivery::to_one(
                    &session.connection_id,
                    ServerEvent::RoomList { rooms },
                )]
            }
        }
    }

    /// Purge all state for a disconnecting connection
    ///
    /// Returns the presence and typing updates the remaining participants
    /// must see. A connection that never identified detaches silently.
    pub async fn disconnect(&self, connection_id: &str) -> Vec<Delivery> {
        let entry = {
            let mut connections = self.connections.write().await;
            connections.remove(connection_id)
        };
        let Some(entry) = entry else {
            warn!("disconnect for unknown connection {}", connection_id);
            return Vec::new();
        };
        debug!(
            "connection {} closed after {} ms",
            connection_id,
            current_timestamp().saturating_sub(entry.connected_at)
        );

        let Some(session) = self.sessions.unregister(connection_id).await else {
            debug!("connection {} detached before identifying", connection_id);
            return Vec::new();
        };

        self.rooms.remove_connection_everywhere(connection_id).await;
        let typing_rooms = self.typing.clear_connection(connection_id).await;

        info!("{} disconnected", session.display_name);

        let mut deliveries = vec![
            Delivery::to_all(ServerEvent::PresenceLeft {
                display_name: session.display_name.clone(),
                connection_id: connection_id.to_string(),
            }),
            Delivery::to_all(ServerEvent::PresenceList {
                users: self.sessions.presence_entries().await,
            }),
        ];

        // Anyone watching a room this connection was typing in gets a
        // refreshed snapshot.
        for room in typing_rooms {
            let names = self.typing.typing_names(&room).await;
            let members = self.rooms.members_of(&room).await;
            deliveries.push(Delivery::to_many(
                members,
                ServerEvent::TypingNames { room, names },
            ));
        }

        deliveries
    }

    // =========================================================================
    // Command handlers
    // =========================================================================

    async fn handle_identify(&self, connection_id: &str, display_name: String) -> Vec<Delivery> {
        if !self.is_attached(connection_id).await {
            warn!("identify from unattached connection {}", connection_id);
            return Vec::new();
        }

        if self.sessions.lookup(connection_id).await.is_some() {
            let err = ChatError::invalid_transition("already identified");
            return vec![Delivery::to_one(connection_id, Self::notice(&err))];
        }

        let display_name = display_name.trim().to_string();
        if display_name.is_empty() || display_name.len() > MAX_DISPLAY_NAME_LEN {
            let err = ChatError::invalid_message("invalid display name length");
            return vec![Delivery::to_one(connection_id, Self::notice(&err))];
        }

        let session = match self.sessions.register(connection_id, &display_name).await {
            Ok(session) => session,
            Err(err) => {
                warn!("registration failed for {}: {}", connection_id, err);
                return vec![Delivery::to_one(connection_id, Self::notice(&err))];
            }
        };

        self.rooms.ensure_room(&self.config.default_room).await;
        self.rooms.join(connection_id, &self.config.default_room).await;

        info!("{} joined the chat", session.display_name);

        vec![
            Delivery::to_all(ServerEvent::PresenceList {
                users: self.sessions.presence_entries().await,
            }),
            Delivery::to_all(ServerEvent::PresenceJoined {
                display_name: session.display_name,
                connection_id: connection_id.to_string(),
            }),
        ]
    }

    /// Join is silent towards other members: only message traffic, not
    /// membership, is announced for rooms.
    async fn handle_join_room(&self, session: &Session, room: &str) -> Vec<Delivery> {
        self.rooms.ensure_room(room).await;
        self.rooms.join(&session.connection_id, room).await;

        let messages = self
            .store
            .history(room, None, self.config.history_page_limit)
            .await;

        debug!("{} joined room {}", session.display_name, room);

        vec![
            Delivery::to_one(
                &session.connection_id,
                ServerEvent::RoomJoined {
                    room: room.to_string(),
                },
            ),
            Delivery::to_one(
                &session.connection_id,
                ServerEvent::RoomHistory {
                    room: room.to_string(),
                    messages,
                },
            ),
        ]
    }

    async fn handle_leave_room(&self, session: &Session, room: &str) -> Vec<Delivery> {
        self.rooms.leave(&session.connection_id, room).await;
        vec![Delivery::to_one(
            &session.connection_id,
            ServerEvent::RoomLeft {
                room: room.to_string(),
            },
        )]
    }

    async fn handle_send_message(
        &self,
        session: &Session,
        body: Option<String>,
        room: Option<RoomName>,
        attachment: Option<Attachment>,
    ) -> Vec<Delivery> {
        if let Some(deliveries) = self.reject_bad_payload(session, &body, &attachment) {
            return deliveries;
        }

        let room = room.unwrap_or_else(|| self.config.default_room.clone());
        self.rooms.ensure_room(&room).await;

        let record = self
            .store
            .append(MessageDraft {
                sender: session.display_name.clone(),
                sender_connection: session.connection_id.clone(),
                body,
                attachment,
                room: room.clone(),
                private: false,
            })
            .await;

        debug!(
            "message {} from {} in room {}",
            record.id, record.sender, room
        );

        let members = self.rooms.members_of(&room).await;
        vec![Delivery::to_many(
            members,
            ServerEvent::RoomMessage { message: record },
        )]
    }

    /// Private delivery is direct-address: the addressee receives the record
    /// whether or not they ever joined the derived private room.
    async fn handle_send_private_message(
        &self,
        session: &Session,
        to: &str,
        body: Option<String>,
        attachment: Option<Attachment>,
    ) -> Vec<Delivery> {
        let Some(recipient) = self.sessions.lookup(to).await else {
            warn!(
                "private message from {} to unknown connection {}",
                session.display_name, to
            );
            return Vec::new();
        };

        if let Some(deliveries) = self.reject_bad_payload(session, &body, &attachment) {
            return deliveries;
        }

        let room =
            RoomDirectory::private_room_name(&session.display_name, &recipient.display_name);
        self.rooms.ensure_room(&room).await;

        let record = self
            .store
            .append(MessageDraft {
                sender: session.display_name.clone(),
                sender_connection: session.connection_id.clone(),
                body,
                attachment,
                room,
                private: true,
            })
            .await;

        let mut recipients = vec![session.connection_id.clone()];
        if recipient.connection_id != session.connection_id {
            recipients.push(recipient.connection_id);
        }

        vec![Delivery::to_many(
            recipients,
            ServerEvent::PrivateMessage { message: record },
        )]
    }

    async fn handle_set_typing(
        &self,
        session: &Session,
        room: Option<RoomName>,
        is_typing: bool,
    ) -> Vec<Delivery> {
        let room = room.unwrap_or_else(|| self.config.default_room.clone());

        self.typing
            .set_typing(
                &session.connection_id,
                &room,
                &session.display_name,
                is_typing,
            )
            .await;

        let names = self.typing.typing_names(&room).await;
        let members = self.rooms.members_of(&room).await;
        vec![Delivery::to_many(
            members,
            ServerEvent::TypingNames { room, names },
        )]
    }

    async fn handle_mark_read(&self, session: &Session, message_id: MessageId) -> Vec<Delivery> {
        if !self
            .annotations
            .mark_read(message_id, &session.display_name)
            .await
        {
            // Unknown message or already-recorded reader: nothing to announce.
            debug!(
                "read receipt from {} for message {} ignored",
                session.display_name, message_id
            );
            return Vec::new();
        }

        let Some(record) = self.store.find_by_id(message_id).await else {
            return Vec::new();
        };

        let recipients = self.annotation_recipients(&record).await;
        vec![Delivery::to_many(
            recipients,
            ServerEvent::ReadReceipt {
                message_id,
                reader: session.display_name.clone(),
            },
        )]
    }

    async fn handle_react(
        &self,
        session: &Session,
        message_id: MessageId,
        kind: &str,
    ) -> Vec<Delivery> {
        if !self
            .annotations
            .add_reaction(message_id, kind, &session.display_name)
            .await
        {
            debug!(
                "reaction {} from {} for message {} ignored",
                kind, session.display_name, message_id
            );
            return Vec::new();
        }

        let Some(record) = self.store.find_by_id(message_id).await else {
            return Vec::new();
        };

        let recipients = self.annotation_recipients(&record).await;
        vec![Delivery::to_many(
            recipients,
            ServerEvent::ReactionUpdate {
                message_id,
                kind: kind.to_string(),
                reactor: session.display_name.clone(),
            },
        )]
    }

    // =========================================================================
    // Queries (pull, side-effect-free)
    // =========================================================================

    /// Page through a room's history, oldest-first
    pub async fn recent_history(
        &self,
        room: &str,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> Vec<MessageRecord> {
        self.store.history(room, before_id, limit).await
    }

    /// Current presence list, ordered by join time
    pub async fn presence(&self) -> Vec<PresenceEntry> {
        self.sessions.presence_entries().await
    }

    /// Known room names, sorted; private threads are never listed
    pub async fn room_names(&self) -> Vec<RoomName> {
        self.rooms
            .room_names()
            .await
            .into_iter()
            .filter(|name| !RoomDirectory::is_private_room_name(name))
            .collect()
    }

    /// Counters for logging and monitoring
    pub async fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            attached_connections: self.connections.read().await.len(),
            identified_sessions: self.sessions.len().await,
            known_rooms: self.rooms.room_count().await,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn is_attached(&self, connection_id: &str) -> bool {
        self.connections.read().await.contains_key(connection_id)
    }

    /// Gate for commands that require the `Identified` state
    ///
    /// An unattached connection is an `UnknownSession`: logged, no
    /// deliveries. An attached-but-anonymous one gets an
    /// `InvalidTransition` notice and no state is mutated.
    async fn require_identified(
        &self,
        connection_id: &str,
        action: &str,
    ) -> std::result::Result<Session, Vec<Delivery>> {
        if !self.is_attached(connection_id).await {
            warn!("{} from unknown connection {}", action, connection_id);
            return Err(Vec::new());
        }

        match self.sessions.lookup(connection_id).await {
            Some(session) => Ok(session),
            None => {
                let err = ChatError::invalid_transition(format!(
                    "identify required before {}",
                    action
                ));
                Err(vec![Delivery::to_one(connection_id, Self::notice(&err))])
            }
        }
    }

    /// Reject sends with no content or an oversized body
    fn reject_bad_payload(
        &self,
        session: &Session,
        body: &Option<String>,
        attachment: &Option<Attachment>,
    ) -> Option<Vec<Delivery>> {
        let has_body = body
            .as_deref()
            .map(|b| !b.trim().is_empty())
            .unwrap_or(false);
        if !has_body && attachment.is_none() {
            let err = ChatError::empty_send("message needs a body or an attachment");
            return Some(vec![Delivery::to_one(
                &session.connection_id,
                Self::notice(&err),
            )]);
        }

        if let Some(body) = body.as_deref() {
            if body.len() > self.config.max_body_bytes {
                let err = ChatError::invalid_message(format!(
                    "body exceeds {} bytes",
                    self.config.max_body_bytes
                ));
                return Some(vec![Delivery::to_one(
                    &session.connection_id,
                    Self::notice(&err),
                )]);
            }
        }

        None
    }

    /// Who should see a read receipt or reaction for a message
    ///
    /// Scoped to the message's room: current members for ordinary rooms;
    /// for private messages, exactly the two participants (resolved by
    /// display name, since private delivery is not membership-gated).
    async fn annotation_recipients(&self, record: &MessageRecord) -> Vec<ConnectionId> {
        if !record.private {
            return self.rooms.members_of(&record.room).await;
        }

        let mut recipients = Vec::new();
        for session in self.sessions.list_active().await {
            let is_sender = session.display_name == record.sender;
            let shares_room = RoomDirectory::private_room_name(
                &session.display_name,
                &record.sender,
            ) == record.room;
            if is_sender || shares_room {
                recipients.push(session.connection_id);
            }
        }
        recipients
    }

    fn notice(err: &ChatError) -> ServerEvent {
        ServerEvent::Notice {
            code: err.code(),
            message: err.to_string(),
        }
    }

    /// Push planned deliveries into the recipients' outbound channels
    ///
    /// Unbounded sends never block; a receiver that went away is skipped.
    /// At-most-once per recipient per delivery; redelivery is the
    /// transport's business.
    async fn deliver(&self, deliveries: &[Delivery]) {
        let connections = self.connections.read().await;
        for delivery in deliveries {
            match &delivery.to {
                Recipients::All => {
                    for entry in connections.values() {
                        let _ = entry.outbound.send(delivery.event.clone());
                    }
                }
                Recipients::One(id) => {
                    if let Some(entry) = connections.get(id) {
                        let _ = entry.outbound.send(delivery.event.clone());
                    }
                }
                Recipients::Many(ids) => {
                    for id in ids {
                        if let Some(entry) = connections.get(id) {
                            let _ = entry.outbound.send(delivery.event.clone());
                        }
                    }
                }
            }
        }
    }
}

/// Coordinator counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub attached_connections: usize,
    pub identified_sessions: usize,
    pub known_rooms: usize,
}
