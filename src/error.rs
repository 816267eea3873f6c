//! Crate-level error types

use tokio_tungstenite::tungstenite;

/// Error type for server and hub operations
#[derive(Debug)]
pub enum Error {
    /// I/O error (bind, accept, socket configuration)
    Io(std::io::Error),
    /// WebSocket handshake or protocol error
    Handshake(tungstenite::Error),
    /// The hub dispatch loop has shut down
    HubClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Handshake(e) => write!(f, "WebSocket handshake failed: {}", e),
            Error::HubClosed => write!(f, "Hub is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Handshake(e) => Some(e),
            Error::HubClosed => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::Handshake(e)
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
