//! The presence & messaging coordinator
//!
//! This module holds the authoritative in-memory model of the chat system
//! and the routing logic on top of it:
//!
//! - **Session registry**: who is online, keyed by connection id
//! - **Room directory**: known rooms and their member sets
//! - **Message store**: bounded per-room message logs
//! - **Typing tracker**: who is typing where
//! - **Annotation tracker**: read receipts and reactions
//! - **Router**: classifies inbound commands, mutates the model, and
//!   produces the explicit fan-out plan

pub mod annotations;
pub mod message_store;
pub mod room_directory;
pub mod router;
pub mod session_registry;
pub mod typing;

pub use annotations::AnnotationTracker;
pub use message_store::{MessageDraft, MessageStore};
pub use room_directory::RoomDirectory;
pub use router::{Coordinator, CoordinatorStats};
pub use session_registry::{Session, SessionRegistry};
pub use typing::TypingTracker;
