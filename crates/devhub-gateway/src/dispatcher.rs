use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use devhub_types::events::GatewayEvent;

use crate::presence::{InMemoryPresence, PresenceStore};

/// Routes server-initiated events to individual users.
///
/// Presence answers "which connection is this user on"; the connection map
/// holds the outbound queue of every socket this process owns.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    presence: Arc<dyn PresenceStore>,

    /// Per-connection send channels: conn_id -> sender
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_presence(Arc::new(InMemoryPresence::new()))
    }

    pub fn with_presence(presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                presence,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection for `user_id`. Returns (conn_id, receiver).
    /// Any earlier connection of the same user stops receiving targeted events.
    pub async fn connect(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        self.inner.presence.set(user_id, conn_id);
        debug!("{} mapped to connection {}", user_id, conn_id);
        (conn_id, rx)
    }

    /// Drop a connection. Returns the user it was still registered for, if
    /// it had not been superseded.
    pub async fn disconnect(&self, conn_id: Uuid) -> Option<String> {
        self.inner.connections.write().await.remove(&conn_id);
        self.inner.presence.delete_by_value(conn_id)
    }

    /// Push an event to the user's current connection. Returns false when the
    /// user is offline, which is not an error: they will see the data on their
    /// next fetch.
    pub async fn send_to_user(&self, user_id: &str, event: GatewayEvent) -> bool {
        let Some(conn_id) = self.inner.presence.get(user_id) else {
            return false;
        };

        let connections = self.inner.connections.read().await;
        match connections.get(&conn_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Number of users with a live connection.
    pub fn online_count(&self) -> usize {
        self.inner.presence.len()
    }
}
