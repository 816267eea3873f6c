//! Connection handles
//!
//! A `ConnectionHandle` is the hub-facing side of one live WebSocket peer.
//! It is cheap to clone (id, channel sender, shared counters) and is what
//! the registry stores and snapshots. The connection task owns the other
//! end of the outbound channel and performs the actual socket writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Stable identity of a connection, unique per process run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands delivered to a connection's writer task
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Write a frame to the peer
    Frame(Message),
    /// Send a close frame and stop writing
    Close,
}

/// Error from [`ConnectionHandle::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection task is gone; the peer is unreachable
    Closed,
    /// The outbound buffer is full; carries the lifetime drop count
    Overflow(u64),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "connection closed"),
            SendError::Overflow(drops) => write!(f, "outbound buffer full ({} drops)", drops),
        }
    }
}

impl std::error::Error for SendError {}

/// Hub-facing handle to one live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Outbound>,
    drops: Arc<AtomicU64>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver for its writer task
    ///
    /// `capacity` bounds the outbound buffer; a full buffer makes `send`
    /// fail rather than block the dispatch loop.
    pub(crate) fn new(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            id,
            outbound: tx,
            drops: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame for delivery to the peer without blocking
    ///
    /// Fails with `Closed` when the connection task has terminated, or
    /// `Overflow` when the peer is too slow to drain its buffer. An
    /// overflowed frame is not retried; the message is lost for this
    /// connection only.
    pub(crate) fn send(&self, frame: Message) -> Result<(), SendError> {
        match self.outbound.try_send(Outbound::Frame(frame)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let drops = self.drops.fetch_add(1, Ordering::Relaxed) + 1;
                Err(SendError::Overflow(drops))
            }
        }
    }

    /// Lifetime count of frames dropped due to a full buffer
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    /// Ask the writer task to close the connection
    ///
    /// Best-effort: if the buffer is full or the task is already gone the
    /// request is discarded, which is fine in both cases.
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
    }
}
