use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::Clock;
use crate::connection::Connection;
use crate::error::RelayError;
use crate::messages::{ServerMessage, Status};
use crate::presence::PresenceRegistry;
use crate::store::Store;

type Connections = Arc<RwLock<HashMap<Uuid, Connection>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unregistered,
    Registered(String),
    Closed,
}

/// Per-connection state owned by that connection's reader loop.
#[derive(Debug)]
pub struct Session {
    connection: Connection,
    state: ConnectionState,
}

impl Session {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Registered(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Owns every live connection, drives the
/// `Unregistered -> Registered -> Closed` transitions and fans presence
/// changes out to all of them.
#[derive(Clone)]
pub struct Lifecycle {
    connections: Connections,
    presence: Arc<PresenceRegistry>,
    store: Arc<dyn Store>,
    clock: Arc<Clock>,
}

impl Lifecycle {
    pub fn new(presence: Arc<PresenceRegistry>, store: Arc<dyn Store>, clock: Arc<Clock>) -> Self {
        Lifecycle {
            connections: Arc::new(RwLock::new(HashMap::new())),
            presence,
            store,
            clock,
        }
    }

    pub async fn connect(&self) -> (Session, mpsc::UnboundedReceiver<ServerMessage>) {
        let (connection, rx) = Connection::open();
        {
            let mut connections = self.connections.write().await;
            connections.insert(connection.id(), connection.clone());
        }
        info!("Connection {} opened", connection.id());

        let session = Session {
            connection,
            state: ConnectionState::Unregistered,
        };
        (session, rx)
    }

    pub async fn register(&self, session: &mut Session, identity: String) -> Result<(), RelayError> {
        if identity.is_empty() {
            return Err(RelayError::MissingField("identity"));
        }

        match &session.state {
            ConnectionState::Unregistered => {}
            ConnectionState::Registered(current) if *current == identity => {
                let owns_entry = self
                    .presence
                    .resolve(&identity)
                    .await
                    .is_some_and(|c| c.same_as(&session.connection));
                if owns_entry {
                    debug!("Connection {} re-registered as {}", session.connection.id(), identity);
                    return Ok(());
                }
                // superseded by another connection since; take the entry back
            }
            ConnectionState::Registered(current) => {
                return Err(RelayError::AlreadyRegistered {
                    current: current.clone(),
                    requested: identity,
                });
            }
            ConnectionState::Closed => return Err(RelayError::Closed),
        }

        let superseded = self
            .presence
            .register(&identity, session.connection.clone())
            .await;
        if let Some(previous) = superseded {
            debug!(
                "{} moved from connection {} to {}",
                identity,
                previous.id(),
                session.connection.id()
            );
        }

        info!("Connection {} registered as {}", session.connection.id(), identity);
        session.state = ConnectionState::Registered(identity.clone());

        self.broadcast(ServerMessage::UserStatus {
            user_id: identity,
            status: Status::Online,
            last_seen: None,
        })
        .await;
        Ok(())
    }

    /// Closes the session. If it still owned its identity's presence entry,
    /// announces the user offline and returns the spawned `last_seen` write.
    pub async fn disconnect(&self, session: &mut Session) -> Option<JoinHandle<()>> {
        let previous = std::mem::replace(&mut session.state, ConnectionState::Closed);
        {
            let mut connections = self.connections.write().await;
            connections.remove(&session.connection.id());
        }
        let lifetime = session.connection.created_at().elapsed().unwrap_or_default();
        info!("Connection {} closed after {:?}", session.connection.id(), lifetime);

        let ConnectionState::Registered(_) = previous else {
            return None;
        };

        let identity = self.presence.remove(&session.connection).await?;
        let now = self.clock.now_millis();

        self.broadcast(ServerMessage::UserStatus {
            user_id: identity.clone(),
            status: Status::Offline,
            last_seen: Some(now),
        })
        .await;

        let store = Arc::clone(&self.store);
        Some(tokio::spawn(async move {
            if let Err(e) = store.set_last_seen(&identity, now).await {
                warn!("Failed to persist last seen for {}: {}", identity, e);
            }
        }))
    }

    /// Sends `message` to every open connection, registered or not.
    pub async fn broadcast(&self, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            connection.send(message.clone());
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
