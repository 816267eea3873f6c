//! Connection registry
//!
//! The set of currently live connections. All mutation and iteration goes
//! through the internal `RwLock`; an atomic counter mirrors the map size so
//! stats reads never take the lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::conn::{ConnectionHandle, ConnectionId};

/// Registry of active connections
///
/// Invariant: a connection is present exactly while its task is alive and
/// has not observed a terminal read or write failure. Both the ingress
/// side and the dispatch loop may remove an entry; removal is idempotent.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    active: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active: AtomicUsize::new(0),
        }
    }

    /// Insert a connection
    ///
    /// A no-op if a connection with the same id is already present.
    pub async fn add(&self, handle: ConnectionHandle) {
        let mut conns = self.connections.write().await;
        if let Entry::Vacant(slot) = conns.entry(handle.id()) {
            slot.insert(handle);
            self.active.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by id
    ///
    /// Returns whether an entry was removed. Removing an absent id is a
    /// no-op, never an error; the ingress loop and the dispatch loop can
    /// both tear down the same connection.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut conns = self.connections.write().await;
        if conns.remove(&id).is_some() {
            self.active.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Point-in-time listing of all registered connections
    ///
    /// Taken under the registry lock so iteration and mutation never
    /// interleave. The dispatch loop fans out to exactly this set.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        let conns = self.connections.read().await;
        conns.values().cloned().collect()
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every connection, asking each writer task to close
    ///
    /// Used on server shutdown.
    pub async fn close_all(&self) {
        let mut conns = self.connections.write().await;
        for (_, handle) in conns.drain() {
            handle.close();
        }
        self.active.store(0, Ordering::Relaxed);
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
