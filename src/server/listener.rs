//! WebSocket server listener
//!
//! Handles the TCP accept loop and spawns connection tasks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::{ConnectionId, HubHandle};
use crate::server::config::ServerConfig;
use crate::server::connection;

/// WebSocket hub server
pub struct HubServer {
    config: ServerConfig,
    hub: HubHandle,
    listener: TcpListener,
    local_addr: SocketAddr,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl HubServer {
    /// Bind the listening socket
    ///
    /// Failure to bind is the only fatal startup error; callers should
    /// abort on it.
    pub async fn bind(config: ServerConfig, hub: HubHandle) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        tracing::info!(addr = %local_addr, path = %config.ws_path, "Hub server listening");

        Ok(Self {
            config,
            hub,
            listener,
            local_addr,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Get the bound address (useful when binding to port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the hub handle this server feeds
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Run the server
    ///
    /// This method blocks until the process shuts down.
    pub async fn run(&self) -> Result<()> {
        self.accept_loop().await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves, every registered connection is closed
    /// before this method returns.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        };

        self.hub.close_all().await;

        result
    }

    async fn accept_loop(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        // Generate session ID
        let session_id = ConnectionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            session_id = %session_id,
            peer = %peer_addr,
            "New connection"
        );

        // Configure socket
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        // Spawn connection task
        let config = self.config.clone();
        let hub = self.hub.clone();

        tokio::spawn(async move {
            // The permit is held until the connection task finishes
            let _permit = permit;
            connection::run(session_id, socket, peer_addr, config, hub).await;
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        Ok(())
    }
}
