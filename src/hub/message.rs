//! Chat message wire format
//!
//! One JSON object per WebSocket text frame, with exactly two fields.
//! The same shape is used in both directions; there is no envelope,
//! sequence number, or acknowledgment.

use serde::{Deserialize, Serialize};

use super::conn::ConnectionId;

/// A single chat message as it appears on the wire
///
/// Serialized as `{"username": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the sender
    pub username: String,
    /// Message body
    pub message: String,
}

impl ChatMessage {
    /// Create a new chat message
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }
}

/// A message queued for dispatch, tagged with its origin
///
/// The origin id lets the dispatch loop skip the sender when echo is
/// disabled. It never appears on the wire.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Connection the message arrived on
    pub sender: ConnectionId,
    /// Decoded payload
    pub message: ChatMessage,
}

impl Inbound {
    /// Create a new inbound envelope
    pub fn new(sender: ConnectionId, message: ChatMessage) -> Self {
        Self { sender, message }
    }
}
