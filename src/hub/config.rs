//! Hub configuration

use std::time::Duration;

/// Hub configuration options
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the broadcast queue; ingress loops block when it is full
    pub queue_capacity: usize,

    /// Capacity of each connection's outbound buffer
    pub outbound_capacity: usize,

    /// Lifetime drop count after which a slow connection is pruned
    pub max_send_drops: u64,

    /// Deadline for a single socket write in the writer task
    pub send_timeout: Duration,

    /// Whether a message is also delivered back to its sender
    pub echo_to_sender: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            outbound_capacity: 64,
            max_send_drops: 100,
            send_timeout: Duration::from_secs(10),
            echo_to_sender: true,
        }
    }
}

impl HubConfig {
    /// Set the broadcast queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the per-connection outbound buffer capacity
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the drop threshold for pruning slow connections
    pub fn max_send_drops(mut self, max: u64) -> Self {
        self.max_send_drops = max;
        self
    }

    /// Set the per-send write deadline
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Enable or disable echoing messages back to their sender
    pub fn echo_to_sender(mut self, echo: bool) -> Self {
        self.echo_to_sender = echo;
        self
    }
}
