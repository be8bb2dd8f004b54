use std::time::SystemTime;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::messages::ServerMessage;

/// One live transport session. The writer half of the socket drains the
/// receiver returned by [`Connection::open`].
#[derive(Clone, Debug)]
pub struct Connection {
    id: Uuid,
    created_at: SystemTime,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
            tx,
        };
        (connection, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Queues an event for this connection. Returns `false` if the writer
    /// side is already gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn same_as(&self, other: &Connection) -> bool {
        self.id == other.id
    }
}
