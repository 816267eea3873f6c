//! Broadcast hub
//!
//! The hub relays every inbound chat message to all live connections. Many
//! ingress loops feed one bounded queue; a single dispatch loop drains it
//! and fans each message out to a point-in-time snapshot of the registry.
//!
//! # Architecture
//!
//! ```text
//!   [Ingress A]──┐                         ┌──► ConnectionHandle A ──► writer ──► peer A
//!   [Ingress B]──┼──► queue ──► [Hub] ─────┼──► ConnectionHandle B ──► writer ──► peer B
//!   [Ingress C]──┘   (mpsc)    dispatch    └──► ConnectionHandle C ──► writer ──► peer C
//!                               loop            (registry snapshot)
//! ```
//!
//! A failed send closes and removes that one connection; delivery to the
//! rest of the snapshot continues. Fan-out for a message completes before
//! the next message is dequeued, so all peers observe the same relative
//! order.

pub mod config;
pub mod conn;
pub mod dispatch;
pub mod message;
pub mod registry;

pub use config::HubConfig;
pub use conn::{ConnectionHandle, ConnectionId, SendError};
pub use dispatch::{Hub, HubHandle};
pub use message::{ChatMessage, Inbound};
pub use registry::ConnectionRegistry;
