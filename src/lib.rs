//! WebSocket broadcast hub server
//!
//! A server-side registry of live WebSocket connections that relays every
//! chat message from any one connection to all others, plus a small game
//! record store that shares the process without touching the hub.
//!
//! # Architecture
//!
//! - **Server** ([`server`]): TCP accept loop, WebSocket upgrade, one task
//!   per connection running an ingress loop and a writer loop.
//! - **Hub** ([`hub`]): connection registry, bounded broadcast queue, and
//!   the single dispatch loop fanning messages out to registry snapshots.
//! - **Store** ([`store`]): create/fetch/update/delete over game records,
//!   consumed as a storage interface only.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use wshub_rs::{Hub, HubConfig, HubServer, ServerConfig};
//!
//! # async fn example() -> wshub_rs::Result<()> {
//! let (hub, handle) = Hub::new(HubConfig::default());
//! tokio::spawn(hub.run());
//!
//! let server = HubServer::bind(ServerConfig::default(), handle).await?;
//! server.run().await
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
pub use hub::{ChatMessage, ConnectionId, ConnectionRegistry, Hub, HubConfig, HubHandle};
pub use server::{HubServer, ServerConfig};
pub use stats::HubStats;
pub use store::{GameId, GameRecord, GameStore, MemoryGameStore, StoreError};
