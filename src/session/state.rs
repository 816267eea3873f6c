//! Session state machine
//!
//! Tracks one connection from TCP accept to teardown.

use std::net::SocketAddr;
use std::time::Instant;

use crate::hub::ConnectionId;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, WebSocket upgrade not started
    Connected,
    /// WebSocket upgrade in progress
    Handshaking,
    /// Upgrade complete, registered with the hub, ingress loop running
    Active,
    /// Session closed
    Closed,
}

/// Per-connection session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id allocated by the listener
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when the WebSocket upgrade completed
    pub handshake_completed_at: Option<Instant>,

    /// Messages read from this peer and forwarded to the hub
    pub messages_received: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connected,
            connected_at: Instant::now(),
            handshake_completed_at: None,
            messages_received: 0,
        }
    }

    /// Transition to the handshaking phase
    pub fn start_handshake(&mut self) {
        if self.phase == SessionPhase::Connected {
            self.phase = SessionPhase::Handshaking;
        }
    }

    /// Complete the WebSocket upgrade
    pub fn complete_handshake(&mut self) {
        if self.phase == SessionPhase::Handshaking {
            self.phase = SessionPhase::Active;
            self.handshake_completed_at = Some(Instant::now());
        }
    }

    /// Record one message forwarded to the hub
    pub fn on_message(&mut self) {
        self.messages_received += 1;
    }

    /// Check if the session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Close the session (terminal)
    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
