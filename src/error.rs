//! Error handling for the messaging coordinator

use std::fmt;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Coordinator error types
///
/// Every variant is recoverable and local to the offending connection; none
/// of these abort the process or disturb other connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// A connection identifier is already registered
    DuplicateConnection(String),
    /// Operation referenced a connection that is not in the registry
    UnknownSession(String),
    /// Read receipt or reaction referenced a nonexistent message id
    UnknownMessage(String),
    /// Event arrived in a connection state that does not allow it
    InvalidTransition(String),
    /// Message carried neither a body nor an attachment
    EmptySend(String),
    /// Message payload failed validation (e.g. oversized body)
    InvalidMessage(String),
    /// Connection limit reached
    ResourceLimit(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Internal coordinator error
    Internal(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::DuplicateConnection(_) => 1000,
            ChatError::UnknownSession(_) => 1001,
            ChatError::UnknownMessage(_) => 1002,
            ChatError::InvalidTransition(_) => 1003,
            ChatError::EmptySend(_) => 1004,
            ChatError::InvalidMessage(_) => 1005,
            ChatError::ResourceLimit(_) => 1006,
            ChatError::Serialization(_) => 1007,
            ChatError::Internal(_) => 1008,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::DuplicateConnection(msg) => msg,
            ChatError::UnknownSession(msg) => msg,
            ChatError::UnknownMessage(msg) => msg,
            ChatError::InvalidTransition(msg) => msg,
            ChatError::EmptySend(msg) => msg,
            ChatError::InvalidMessage(msg) => msg,
            ChatError::ResourceLimit(msg) => msg,
            ChatError::Serialization(msg) => msg,
            ChatError::Internal(msg) => msg,
        }
    }

    /// Create a duplicate connection error
    pub fn duplicate_connection<T: Into<String>>(msg: T) -> Self {
        ChatError::DuplicateConnection(msg.into())
    }

    /// Create an unknown session error
    pub fn unknown_session<T: Into<String>>(msg: T) -> Self {
        ChatError::UnknownSession(msg.into())
    }

    /// Create an unknown message error
    pub fn unknown_message<T: Into<String>>(msg: T) -> Self {
        ChatError::UnknownMessage(msg.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidTransition(msg.into())
    }

    /// Create an empty send error
    pub fn empty_send<T: Into<String>>(msg: T) -> Self {
        ChatError::EmptySend(msg.into())
    }

    /// Create an invalid message error
    pub fn invalid_message<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidMessage(msg.into())
    }

    /// Create a resource limit error
    pub fn resource_limit<T: Into<String>>(msg: T) -> Self {
        ChatError::ResourceLimit(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ChatError::Serialization(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::DuplicateConnection(msg) => write!(f, "Duplicate connection: {}", msg),
            ChatError::UnknownSession(msg) => write!(f, "Unknown session: {}", msg),
            ChatError::UnknownMessage(msg) => write!(f, "Unknown message: {}", msg),
            ChatError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            ChatError::EmptySend(msg) => write!(f, "Empty send: {}", msg),
            ChatError::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            ChatError::ResourceLimit(msg) => write!(f, "Resource limit exceeded: {}", msg),
            ChatError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Internal(format!("Anyhow error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_distinct() {
        let errors = [
            ChatError::duplicate_connection("a"),
            ChatError::unknown_session("b"),
            ChatError::unknown_message("c"),
            ChatError::invalid_transition("d"),
            ChatError::empty_send("e"),
            ChatError::invalid_message("f"),
            ChatError::resource_limit("g"),
            ChatError::serialization("h"),
            ChatError::internal("i"),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ChatError::invalid_transition("identify required before send_message");
        assert!(err.to_string().contains("identify required"));
        assert_eq!(err.message(), "identify required before send_message");
    }

    #[test]
    fn test_from_serde_json() {
        let bad: std::result::Result<u64, _> = serde_json::from_str("not json");
        let err: ChatError = bad.unwrap_err().into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }
}
