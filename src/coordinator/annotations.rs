//! Annotation tracker: read receipts and reactions
//!
//! Attaches reader and reactor names to stored messages by id. Both
//! operations are idempotent; the boolean result reports whether anything
//! was actually added, which is what decides whether a broadcast goes out.

use std::sync::Arc;

use crate::coordinator::message_store::MessageStore;
use crate::protocol::events::MessageId;

/// Tracks read receipts and reactions on stored messages
pub struct AnnotationTracker {
    store: Arc<MessageStore>,
}

impl AnnotationTracker {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self { store }
    }

    /// Add a reader to a message's read set
    ///
    /// Returns true only the first time the reader is added; false when the
    /// message is unknown or the reader was already present.
    pub async fn mark_read(&self, message_id: MessageId, display_name: &str) -> bool {
        self.store
            .update_message(message_id, |message| {
                if message.read_by.iter().any(|name| name == display_name) {
                    false
                } else {
                    message.read_by.push(display_name.to_string());
                    true
                }
            })
            .await
            .unwrap_or(false)
    }

    /// Add a reactor under a reaction kind
    ///
    /// Same contract as `mark_read`, keyed by (message, kind, reactor).
    pub async fn add_reaction(&self, message_id: MessageId, kind: &str, display_name: &str) -> bool {
        self.store
            .update_message(message_id, |message| {
                let reactors = message.reactions.entry(kind.to_string()).or_default();
                if reactors.iter().any(|name| name == display_name) {
                    false
                } else {
                    reactors.push(display_name.to_string());
                    true
                }
            })
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::message_store::MessageDraft;

    async fn store_with_message() -> (Arc<MessageStore>, MessageId) {
        let store = Arc::new(MessageStore::new(100));
        let record = store
            .append(MessageDraft {
                sender: "alice".to_string(),
                sender_connection: "c1".to_string(),
                body: Some("hello".to_string()),
                attachment: None,
                room: "global".to_string(),
                private: false,
            })
            .await;
        (store, record.id)
    }

    #[tokio::test]
    async fn test_mark_read_idempotent() {
        let (store, id) = store_with_message().await;
        let tracker = AnnotationTracker::new(Arc::clone(&store));

        assert!(tracker.mark_read(id, "bob").await);
        assert!(!tracker.mark_read(id, "bob").await);

        let message = store.find_by_id(id).await.unwrap();
        assert_eq!(message.read_by, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_message() {
        let (store, _) = store_with_message().await;
        let tracker = AnnotationTracker::new(store);

        assert!(!tracker.mark_read(999, "bob").await);
    }

    #[tokio::test]
    async fn test_add_reaction_keyed_by_kind_and_reactor() {
        let (store, id) = store_with_message().await;
        let tracker = AnnotationTracker::new(Arc::clone(&store));

        assert!(tracker.add_reaction(id, "like", "bob").await);
        assert!(!tracker.add_reaction(id, "like", "bob").await);
        // Same reactor under a different kind is a new addition.
        assert!(tracker.add_reaction(id, "love", "bob").await);
        // Same kind from a different reactor too.
        assert!(tracker.add_reaction(id, "like", "carol").await);

        let message = store.find_by_id(id).await.unwrap();
        assert_eq!(
            message.reactions.get("like"),
            Some(&vec!["bob".to_string(), "carol".to_string()])
        );
        assert_eq!(message.reactions.get("love"), Some(&vec!["bob".to_string()]));
    }
}
