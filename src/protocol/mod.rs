//! Protocol layer for the messaging coordinator
//!
//! This module provides:
//! - Inbound command definitions (client -> coordinator)
//! - Outbound event definitions (coordinator -> clients)
//! - The explicit delivery plan produced by dispatch

pub mod commands;
pub mod events;

// Re-export commonly used types
pub use commands::ClientCommand;
pub use events::*;
