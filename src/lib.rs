//! In-memory presence and messaging coordinator
//!
//! This library provides the authoritative server-side model for a real-time
//! chat system: who is online, which rooms each participant has joined,
//! bounded per-room message history, ephemeral typing state, read receipts
//! and reactions, plus the routing logic that fans events out to the right
//! connections. The transport that carries events to clients is plugged in
//! at the boundary via per-connection channels.

pub mod coordinator;
pub mod error;
pub mod protocol;

pub use coordinator::Coordinator;
pub use error::{ChatError, Result};
pub use protocol::{ClientCommand, Delivery, Recipients, ServerEvent};

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Coordinator configuration
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Room every identified participant is auto-joined to
    pub default_room: String,
    /// Maximum messages retained per room before oldest-first eviction
    pub room_history_cap: usize,
    /// Messages sent in the history reply on room join
    pub history_page_limit: usize,
    /// Maximum number of attached connections
    pub max_connections: usize,
    /// Maximum message body size in bytes
    pub max_body_bytes: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_room: "global".to_string(),
            room_history_cap: 100,
            history_page_limit: 50,
            max_connections: 10_000,
            max_body_bytes: 64 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.default_room, "global");
        assert_eq!(config.room_history_cap, 100);
        assert_eq!(config.history_page_limit, 50);
    }

    #[test]
    fn test_timestamp_monotonic_enough() {
        let a = current_timestamp();
        let b = current_timestamp();
        assert!(a > 0);
        assert!(b >= a);
    }
}
