use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::connection::Connection;

#[derive(Default)]
struct Entries {
    by_identity: HashMap<String, Connection>,
    by_connection: HashMap<Uuid, String>,
}

/// Maps a user identity to the connection it is reachable on. At most one
/// connection per identity; the latest registration wins.
///
/// The lock is only held for the map mutation itself, never across I/O.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: RwLock<Entries>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the mapping for `identity`, returning the
    /// connection it superseded, if any. The superseded connection is not
    /// told about it.
    pub async fn register(&self, identity: &str, connection: Connection) -> Option<Connection> {
        let mut entries = self.entries.write().await;
        entries
            .by_connection
            .insert(connection.id(), identity.to_string());
        let previous = entries
            .by_identity
            .insert(identity.to_string(), connection.clone());

        if let Some(previous) = &previous {
            if !previous.same_as(&connection) {
                entries.by_connection.remove(&previous.id());
            }
        }
        previous
    }

    pub async fn resolve(&self, identity: &str) -> Option<Connection> {
        let entries = self.entries.read().await;
        entries.by_identity.get(identity).cloned()
    }

    /// Removes the mapping that currently points at exactly `connection`.
    /// Returns the evicted identity, or `None` if this connection was never
    /// registered or has since been superseded.
    pub async fn remove(&self, connection: &Connection) -> Option<String> {
        let mut entries = self.entries.write().await;
        let identity = entries.by_connection.remove(&connection.id())?;

        let still_current = entries
            .by_identity
            .get(&identity)
            .is_some_and(|current| current.same_as(connection));
        if !still_current {
            return None;
        }
        entries.by_identity.remove(&identity);
        Some(identity)
    }

    pub async fn is_online(&self, identity: &str) -> bool {
        let entries = self.entries.read().await;
        entries.by_identity.contains_key(identity)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_identity.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
