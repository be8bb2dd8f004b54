use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::RelayError;
use crate::messages::ServerMessage;
use crate::presence::PresenceRegistry;
use crate::store::{Store, StoredMessage};

/// A direct message as submitted by its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image_data: Option<String>,
    pub sender_lang: String,
    pub sender_name: String,
}

/// Outcome of a relayed send. `persisted` resolves once the store write
/// has finished, whether or not it succeeded.
pub struct Relayed {
    pub message: StoredMessage,
    pub delivered: bool,
    pub persisted: JoinHandle<()>,
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), RelayError> {
    if value.is_empty() {
        Err(RelayError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Routes direct messages, read receipts and typing indicators.
///
/// Persistence and live delivery are independent: the store write runs as
/// its own task and a live recipient may see the event before the record
/// is queryable. Offline recipients are never queued for.
#[derive(Clone)]
pub struct MessageRelay {
    presence: Arc<PresenceRegistry>,
    store: Arc<dyn Store>,
    clock: Arc<Clock>,
}

impl MessageRelay {
    pub fn new(presence: Arc<PresenceRegistry>, store: Arc<dyn Store>, clock: Arc<Clock>) -> Self {
        MessageRelay { presence, store, clock }
    }

    pub async fn send_direct_message(&self, outgoing: OutgoingMessage) -> Result<Relayed, RelayError> {
        require("senderId", &outgoing.sender_id)?;
        require("receiverId", &outgoing.receiver_id)?;

        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: outgoing.sender_id,
            receiver_id: outgoing.receiver_id,
            text: outgoing.text.filter(|t| !t.is_empty()),
            image_data: outgoing.image_data.filter(|i| !i.is_empty()),
            sender_lang: outgoing.sender_lang,
            timestamp: self.clock.now_millis(),
            is_read: false,
        };

        let store = Arc::clone(&self.store);
        let record = message.clone();
        let persisted = tokio::spawn(async move {
            let id = record.id.clone();
            if let Err(e) = store.insert_message(record).await {
                warn!("Failed to persist message {}: {}", id, e);
            }
        });

        let delivered = match self.presence.resolve(&message.receiver_id).await {
            Some(connection) => connection.send(ServerMessage::ReceivePrivateMessage {
                id: message.id.clone(),
                sender_id: message.sender_id.clone(),
                sender_name: outgoing.sender_name,
                text: message.text.clone(),
                image_data: message.image_data.clone(),
                sender_lang: message.sender_lang.clone(),
                timestamp: message.timestamp,
            }),
            None => false,
        };
        debug!(
            "Message {} from {} to {} (delivered: {})",
            message.id, message.sender_id, message.receiver_id, delivered
        );

        Ok(Relayed {
            message,
            delivered,
            persisted,
        })
    }

    /// Flags everything `other` sent to `reader` as read, then tells
    /// `other` if they are online. Returns the spawned store update.
    pub async fn mark_read(&self, reader: &str, other: &str) -> Result<JoinHandle<()>, RelayError> {
        require("userId", reader)?;
        require("otherId", other)?;

        let store = Arc::clone(&self.store);
        let (sender, receiver) = (other.to_string(), reader.to_string());
        let persisted = tokio::spawn(async move {
            match store.mark_read(&sender, &receiver).await {
                Ok(count) => debug!("Marked {} messages from {} to {} read", count, sender, receiver),
                Err(e) => warn!("Failed to mark messages from {} to {} read: {}", sender, receiver, e),
            }
        });

        if let Some(connection) = self.presence.resolve(other).await {
            connection.send(ServerMessage::MessagesRead {
                reader_id: reader.to_string(),
            });
        }
        Ok(persisted)
    }

    /// Pure relay; dropped if `receiver` is offline. Returns whether it was
    /// handed to a connection.
    pub async fn typing(&self, sender: &str, receiver: &str, is_typing: bool) -> Result<bool, RelayError> {
        require("senderId", sender)?;
        require("receiverId", receiver)?;

        let Some(connection) = self.presence.resolve(receiver).await else {
            debug!("Typing indicator from {} dropped, {} offline", sender, receiver);
            return Ok(false);
        };
        Ok(connection.send(ServerMessage::TypingStatus {
            sender_id: sender.to_string(),
            is_typing,
        }))
    }
}
