//! Hub statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for hub activity
///
/// All counters are atomics; the struct is shared behind an `Arc` and
/// updated from the dispatch loop and the listener without locking.
#[derive(Debug, Default)]
pub struct HubStats {
    /// Messages drained from the broadcast queue
    messages_dispatched: AtomicU64,
    /// Frames queued to connection buffers across all dispatch passes
    deliveries: AtomicU64,
    /// Frames dropped because an outbound buffer was full
    send_drops: AtomicU64,
    /// Connections removed during dispatch (dead or slow peers)
    connections_pruned: AtomicU64,
    /// Connections ever registered
    total_connections: AtomicU64,
}

impl HubStats {
    /// Create a zeroed stats block
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&self, recipients: u64) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(recipients, Ordering::Relaxed);
    }

    pub(crate) fn record_send_drop(&self) {
        self.send_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self) {
        self.connections_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages drained from the broadcast queue
    pub fn messages_dispatched(&self) -> u64 {
        self.messages_dispatched.load(Ordering::Relaxed)
    }

    /// Frames queued for delivery across all connections
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Frames dropped on full outbound buffers
    pub fn send_drops(&self) -> u64 {
        self.send_drops.load(Ordering::Relaxed)
    }

    /// Connections removed during dispatch
    pub fn connections_pruned(&self) -> u64 {
        self.connections_pruned.load(Ordering::Relaxed)
    }

    /// Connections ever registered
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = HubStats::new();

        assert_eq!(stats.messages_dispatched(), 0);
        assert_eq!(stats.deliveries(), 0);
        assert_eq!(stats.send_drops(), 0);
        assert_eq!(stats.connections_pruned(), 0);
        assert_eq!(stats.total_connections(), 0);
    }

    #[test]
    fn test_record_dispatch_counts_recipients() {
        let stats = HubStats::new();

        stats.record_dispatch(3);
        stats.record_dispatch(2);

        assert_eq!(stats.messages_dispatched(), 2);
        assert_eq!(stats.deliveries(), 5);
    }

    #[test]
    fn test_record_counters() {
        let stats = HubStats::new();

        stats.record_send_drop();
        stats.record_pruned();
        stats.record_connection();
        stats.record_connection();

        assert_eq!(stats.send_drops(), 1);
        assert_eq!(stats.connections_pruned(), 1);
        assert_eq!(stats.total_connections(), 2);
    }
}
