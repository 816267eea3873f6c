//! Hub and dispatch loop
//!
//! The hub owns the connection registry and the broadcast queue and runs
//! the single loop that drains the queue, fanning each message out to a
//! registry snapshot. Ingress loops talk to it through a cloneable
//! [`HubHandle`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Error;
use crate::stats::HubStats;

use super::config::HubConfig;
use super::conn::{ConnectionHandle, ConnectionId, SendError};
use super::message::{ChatMessage, Inbound};
use super::registry::ConnectionRegistry;

/// Why a connection was pruned during a dispatch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PruneReason {
    /// The connection task has terminated
    PeerGone,
    /// The connection exceeded its drop budget
    SlowConsumer,
}

impl PruneReason {
    fn as_str(self) -> &'static str {
        match self {
            PruneReason::PeerGone => "peer gone",
            PruneReason::SlowConsumer => "slow consumer",
        }
    }
}

/// The broadcast hub
///
/// Sole consumer of the broadcast queue. Constructed together with its
/// [`HubHandle`]; call [`Hub::run`] on a dedicated task.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<HubStats>,
    config: HubConfig,
    inbound_rx: mpsc::Receiver<Inbound>,
}

impl Hub {
    /// Create a hub and the handle used to feed it
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
        let registry = Arc::new(ConnectionRegistry::new());
        let stats = Arc::new(HubStats::new());

        let hub = Self {
            registry: Arc::clone(&registry),
            stats: Arc::clone(&stats),
            config: config.clone(),
            inbound_rx,
        };
        let handle = HubHandle {
            registry,
            stats,
            config,
            inbound_tx,
        };
        (hub, handle)
    }

    /// Run the dispatch loop
    ///
    /// Returns when every handle has been dropped. Dispatch is strictly
    /// sequential: fan-out for one message completes before the next is
    /// dequeued.
    pub async fn run(mut self) {
        tracing::debug!("Hub dispatch loop started");

        while let Some(inbound) = self.inbound_rx.recv().await {
            self.dispatch(inbound).await;
        }

        tracing::debug!("Hub dispatch loop stopped");
    }

    /// Fan one message out to the current registry snapshot
    ///
    /// A failed send closes and removes that connection only; delivery to
    /// the rest of the snapshot continues.
    async fn dispatch(&self, inbound: Inbound) {
        let json = match serde_json::to_string(&inbound.message) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize message, dropping");
                return;
            }
        };
        let frame = Message::text(json);

        let snapshot = self.registry.snapshot().await;
        let mut pruned: Vec<(ConnectionHandle, PruneReason)> = Vec::new();
        let mut recipients = 0u32;

        for handle in &snapshot {
            if !self.config.echo_to_sender && handle.id() == inbound.sender {
                continue;
            }

            match handle.send(frame.clone()) {
                Ok(()) => recipients += 1,
                Err(SendError::Closed) => {
                    pruned.push((handle.clone(), PruneReason::PeerGone));
                }
                Err(SendError::Overflow(drops)) => {
                    self.stats.record_send_drop();
                    if drops >= self.config.max_send_drops {
                        pruned.push((handle.clone(), PruneReason::SlowConsumer));
                    } else {
                        tracing::warn!(
                            session_id = %handle.id(),
                            drops = drops,
                            "Outbound buffer full, frame dropped"
                        );
                    }
                }
            }
        }

        for (handle, reason) in pruned {
            handle.close();
            if self.registry.remove(handle.id()).await {
                self.stats.record_pruned();
                tracing::info!(
                    session_id = %handle.id(),
                    reason = reason.as_str(),
                    "Connection removed during dispatch"
                );
            }
        }

        self.stats.record_dispatch(recipients as u64);
        tracing::debug!(
            sender = %inbound.sender,
            username = %inbound.message.username,
            recipients = recipients,
            "Message dispatched"
        );
    }
}

/// Cloneable handle to a running [`Hub`]
///
/// Ingress loops use it to register connections and submit messages; the
/// server uses it for shutdown.
#[derive(Clone)]
pub struct HubHandle {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<HubStats>,
    config: HubConfig,
    inbound_tx: mpsc::Sender<Inbound>,
}

impl HubHandle {
    /// Register a connection
    pub async fn register(&self, handle: ConnectionHandle) {
        self.registry.add(handle).await;
        self.stats.record_connection();
    }

    /// Deregister a connection; a no-op if it is already gone
    pub async fn deregister(&self, id: ConnectionId) {
        self.registry.remove(id).await;
    }

    /// Push a message onto the broadcast queue
    ///
    /// Blocks while the queue is full, applying backpressure to the
    /// submitting ingress loop. Fails only when the hub has shut down.
    pub async fn submit(&self, sender: ConnectionId, message: ChatMessage) -> crate::Result<()> {
        self.inbound_tx
            .send(Inbound::new(sender, message))
            .await
            .map_err(|_| Error::HubClosed)
    }

    /// Number of currently registered connections
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Hub statistics
    pub fn stats(&self) -> &Arc<HubStats> {
        &self.stats
    }

    /// Hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Close every registered connection (server shutdown)
    pub async fn close_all(&self) {
        self.registry.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::conn::Outbound;
    use tokio::sync::mpsc::Receiver;

    async fn recv_text(rx: &mut Receiver<Outbound>) -> String {
        match rx.recv().await.expect("channel closed") {
            Outbound::Frame(Message::Text(txt)) => txt.as_str().to_owned(),
            other => panic!("unexpected outbound: {:?}", other),
        }
    }

    async fn registered(handle: &HubHandle, id: u64) -> (ConnectionHandle, Receiver<Outbound>) {
        let (conn, rx) = ConnectionHandle::new(ConnectionId(id), handle.config().outbound_capacity);
        handle.register(conn.clone()).await;
        (conn, rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_including_sender() {
        let (hub, handle) = Hub::new(HubConfig::default());
        let (_a, mut rx_a) = registered(&handle, 1).await;
        let (_b, mut rx_b) = registered(&handle, 2).await;
        let (_c, mut rx_c) = registered(&handle, 3).await;

        hub.dispatch(Inbound::new(ConnectionId(1), ChatMessage::new("a", "hi")))
            .await;

        let expected = r#"{"username":"a","message":"hi"}"#;
        assert_eq!(recv_text(&mut rx_a).await, expected);
        assert_eq!(recv_text(&mut rx_b).await, expected);
        assert_eq!(recv_text(&mut rx_c).await, expected);
    }

    #[tokio::test]
    async fn test_no_double_delivery() {
        let (hub, handle) = Hub::new(HubConfig::default());
        let (_a, mut rx_a) = registered(&handle, 1).await;

        hub.dispatch(Inbound::new(ConnectionId(1), ChatMessage::new("a", "once")))
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_echo_disabled_skips_sender() {
        let (hub, handle) = Hub::new(HubConfig::default().echo_to_sender(false));
        let (_a, mut rx_a) = registered(&handle, 1).await;
        let (_b, mut rx_b) = registered(&handle, 2).await;

        hub.dispatch(Inbound::new(ConnectionId(1), ChatMessage::new("a", "hi")))
            .await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_failed_send_is_isolated() {
        let (hub, handle) = Hub::new(HubConfig::default());
        let (_a, mut rx_a) = registered(&handle, 1).await;
        let (_b, rx_b) = registered(&handle, 2).await;
        let (_c, mut rx_c) = registered(&handle, 3).await;

        // B's task is gone
        drop(rx_b);

        hub.dispatch(Inbound::new(ConnectionId(3), ChatMessage::new("c", "hi")))
            .await;

        // A and C still receive; B has been removed
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
        assert_eq!(handle.connection_count(), 2);
        assert_eq!(handle.stats().connections_pruned(), 1);
    }

    #[tokio::test]
    async fn test_slow_consumer_pruned_at_threshold() {
        let config = HubConfig::default().outbound_capacity(1).max_send_drops(2);
        let (hub, handle) = Hub::new(config);
        let (_slow, _rx_slow) = registered(&handle, 1).await;
        let (_fast, mut rx_fast) = registered(&handle, 2).await;

        // First message fills the slow buffer; two more exceed the budget
        for body in ["m1", "m2", "m3"] {
            hub.dispatch(Inbound::new(ConnectionId(2), ChatMessage::new("x", body)))
                .await;
            while rx_fast.try_recv().is_ok() {}
        }

        assert_eq!(handle.connection_count(), 1);
        assert_eq!(handle.stats().send_drops(), 2);
    }

    #[tokio::test]
    async fn test_slow_consumer_below_threshold_kept() {
        let config = HubConfig::default().outbound_capacity(1).max_send_drops(100);
        let (hub, handle) = Hub::new(config);
        let (_slow, _rx_slow) = registered(&handle, 1).await;

        hub.dispatch(Inbound::new(ConnectionId(1), ChatMessage::new("x", "m1")))
            .await;
        hub.dispatch(Inbound::new(ConnectionId(1), ChatMessage::new("x", "m2")))
            .await;

        // One drop recorded, connection still registered
        assert_eq!(handle.connection_count(), 1);
        assert_eq!(handle.stats().send_drops(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_order_preserved() {
        let (hub, handle) = Hub::new(HubConfig::default());
        let (_a, mut rx_a) = registered(&handle, 1).await;

        let hub_task = tokio::spawn(hub.run());

        handle
            .submit(ConnectionId(1), ChatMessage::new("a", "first"))
            .await
            .unwrap();
        handle
            .submit(ConnectionId(1), ChatMessage::new("a", "second"))
            .await
            .unwrap();

        assert!(recv_text(&mut rx_a).await.contains("first"));
        assert!(recv_text(&mut rx_a).await.contains("second"));

        drop(handle);
        hub_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let (hub, handle) = Hub::new(HubConfig::default());
        drop(hub);

        let result = handle
            .submit(ConnectionId(1), ChatMessage::new("a", "hi"))
            .await;

        assert!(matches!(result, Err(Error::HubClosed)));
    }

    #[tokio::test]
    async fn test_dispatch_to_empty_registry() {
        let (hub, handle) = Hub::new(HubConfig::default());

        // Should not panic
        hub.dispatch(Inbound::new(ConnectionId(9), ChatMessage::new("x", "hi")))
            .await;

        assert_eq!(handle.stats().messages_dispatched(), 1);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let (_hub, handle) = Hub::new(HubConfig::default());
        let (_a, mut rx_a) = registered(&handle, 1).await;

        handle.close_all().await;

        assert_eq!(handle.connection_count(), 0);
        assert!(matches!(rx_a.recv().await.unwrap(), Outbound::Close));
    }
}
