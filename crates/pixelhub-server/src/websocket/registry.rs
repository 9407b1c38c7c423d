//! Set of connections eligible to receive broadcasts.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::gauge;
use pixelhub_core::ConnectionId;
use tokio::sync::RwLock;

use super::connection::Connection;
use crate::metrics::WS_CONNECTIONS_ACTIVE;

/// Live connections keyed by ID.
///
/// Structural changes take the write lock; [`snapshot`](Self::snapshot)
/// holds the read lock only while cloning the `Arc`s out, so sends never
/// run under the lock.
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    active_count: AtomicUsize,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection. Returns `false` if the ID was already present.
    pub async fn register(&self, connection: Arc<Connection>) -> bool {
        let mut conns = self.connections.write().await;
        let id = connection.id().clone();
        if conns.contains_key(&id) {
            return false;
        }
        let _ = conns.insert(id, connection);
        let count = self.active_count.fetch_add(1, Ordering::Relaxed) + 1;
        #[allow(clippy::cast_precision_loss)]
        gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
        true
    }

    /// Remove a connection. Returns `false` if it was not present.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        let mut conns = self.connections.write().await;
        if conns.remove(id).is_none() {
            return false;
        }
        let count = self.active_count.fetch_sub(1, Ordering::Relaxed) - 1;
        #[allow(clippy::cast_precision_loss)]
        gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
        true
    }

    /// Point-in-time copy of the members.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Number of registered connections, without taking the lock.
    pub fn count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
