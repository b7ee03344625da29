use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

/// Where a user's live connection can be found.
///
/// Keyed by user id, valued by connection id. One user maps to at most one
/// connection: a newer registration overwrites the older one, so only the
/// most recent connection of a user is reachable.
pub trait PresenceStore: Send + Sync {
    /// Insert or overwrite the user's connection.
    fn set(&self, user_id: &str, conn_id: Uuid);

    fn get(&self, user_id: &str) -> Option<Uuid>;

    /// Remove whichever user currently maps to `conn_id`, returning it.
    /// A connection that was already superseded removes nothing.
    fn delete_by_value(&self, conn_id: Uuid) -> Option<String>;

    fn len(&self) -> usize;
}

/// Process-local presence. Lost on restart; clients re-register on reconnect.
#[derive(Default)]
pub struct InMemoryPresence {
    entries: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresenceStore for InMemoryPresence {
    fn set(&self, user_id: &str, conn_id: Uuid) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), conn_id);
    }

    fn get(&self, user_id: &str) -> Option<Uuid> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .copied()
    }

    // Linear in the number of online users.
    fn delete_by_value(&self, conn_id: Uuid) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let user_id = entries
            .iter()
            .find(|(_, cid)| **cid == conn_id)
            .map(|(uid, _)| uid.clone())?;
        entries.remove(&user_id);
        Some(user_id)
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
