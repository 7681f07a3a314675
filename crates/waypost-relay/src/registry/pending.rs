//! Table of in-flight signaling sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use super::channels::ControlChannel;

/// Bookkeeping for one in-flight peer handshake.
///
/// Holds a strong reference to the originator's channel; the target is
/// resolved through the live machine index at every step, never cached.
pub struct PendingConnection {
    /// Connection id (UUID v4).
    pub id: String,
    /// Originator's stable id: its machine id, or a transient web-client id.
    pub from_client_id: String,
    /// Whether `from_client_id` is a transient web-client id.
    pub from_web: bool,
    /// The originator's live channel.
    pub origin: Arc<ControlChannel>,
    /// Target machine id.
    pub to_machine_id: String,
    pub created_at: Instant,
}

/// Map of connection id → pending connection, shared across tasks.
#[derive(Default)]
pub struct PendingConnections {
    inner: RwLock<HashMap<String, Arc<PendingConnection>>>,
}

impl PendingConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pending: PendingConnection) {
        self.inner
            .write()
            .await
            .insert(pending.id.clone(), Arc::new(pending));
    }

    pub async fn get(&self, connection_id: &str) -> Option<Arc<PendingConnection>> {
        self.inner.read().await.get(connection_id).cloned()
    }

    /// Remove and return the pending connection, if still present.
    pub async fn remove(&self, connection_id: &str) -> Option<Arc<PendingConnection>> {
        self.inner.write().await.remove(connection_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn pending(id: &str) -> PendingConnection {
        let (tx, _rx) = mpsc::channel(4);
        PendingConnection {
            id: id.to_string(),
            from_client_id: "web-client-1".to_string(),
            from_web: true,
            origin: ControlChannel::new(1, tx),
            to_machine_id: "m1".to_string(),
            created_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let table = PendingConnections::new();
        table.insert(pending("c1")).await;

        assert_eq!(table.len().await, 1);
        assert!(table.get("c1").await.is_some());
        assert!(table.get("c2").await.is_none());

        let removed = table.remove("c1").await.unwrap();
        assert_eq!(removed.to_machine_id, "m1");
        assert!(table.is_empty().await);

        // Double remove finds nothing.
        assert!(table.remove("c1").await.is_none());
    }
}
