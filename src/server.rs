use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use warp::ws::{Message, WebSocket};

use crate::clock::Clock;
use crate::error::RelayError;
use crate::lifecycle::{Lifecycle, Session};
use crate::messages::ClientMessage;
use crate::presence::PresenceRegistry;
use crate::relay::{MessageRelay, OutgoingMessage};
use crate::signaling::CallSignaling;
use crate::store::Store;

#[derive(Clone)]
pub struct Server {
    presence: Arc<PresenceRegistry>,
    store: Arc<dyn Store>,
    clock: Arc<Clock>,
    lifecycle: Lifecycle,
    relay: MessageRelay,
    signaling: CallSignaling,
}

impl Server {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        let clock = Arc::new(Clock::new());

        Server {
            lifecycle: Lifecycle::new(presence.clone(), store.clone(), clock.clone()),
            relay: MessageRelay::new(presence.clone(), store.clone(), clock.clone()),
            signaling: CallSignaling::new(presence.clone()),
            presence,
            store,
            clock,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceRegistry> {
        &self.presence
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub async fn handle_connection(&self, ws: WebSocket) {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let (mut session, mut rx) = self.lifecycle.connect().await;
        let connection_id = session.connection().id();

        let server = self.clone();
        tokio::spawn(async move {
            while let Some(result) = ws_rx.next().await {
                match result {
                    Ok(msg) if msg.is_close() => break,
                    Ok(msg) => {
                        if let Ok(text) = msg.to_str() {
                            server.handle_text(&mut session, text).await;
                        }
                    }
                    Err(e) => {
                        error!("WebSocket error on {}: {}", connection_id, e);
                        break;
                    }
                }
            }

            server.lifecycle.disconnect(&mut session).await;
        });

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode {}: {}", message.event_name(), e);
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(Message::text(text)).await {
                    error!("Failed to send WebSocket message to {}: {}", connection_id, e);
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });
    }

    /// Parses one inbound frame and dispatches it. Malformed frames are
    /// logged and dropped; the connection stays open.
    pub async fn handle_text(&self, session: &mut Session, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => {
                if let Err(e) = self.handle_client_message(session, message).await {
                    warn!("Dropped event from {}: {}", session.connection().id(), e);
                }
            }
            Err(e) => warn!(
                "Malformed event from {}: {}",
                session.connection().id(),
                e
            ),
        }
    }

    pub async fn handle_client_message(
        &self,
        session: &mut Session,
        message: ClientMessage,
    ) -> Result<(), RelayError> {
        match message {
            ClientMessage::Register(identity) => {
                self.lifecycle.register(session, identity).await?;
            }

            ClientMessage::SendPrivateMessage {
                sender_id,
                receiver_id,
                text,
                image_data,
                sender_lang,
                sender_name,
            } => {
                // fire-and-forget: the store write is left to finish on its own
                let _ = self
                    .relay
                    .send_direct_message(OutgoingMessage {
                        sender_id,
                        receiver_id,
                        text,
                        image_data,
                        sender_lang,
                        sender_name,
                    })
                    .await?;
            }

            ClientMessage::Typing {
                sender_id,
                receiver_id,
                is_typing,
            } => {
                self.relay.typing(&sender_id, &receiver_id, is_typing).await?;
            }

            ClientMessage::MarkRead { user_id, other_id } => {
                drop(self.relay.mark_read(&user_id, &other_id).await?);
            }

            ClientMessage::CallUser {
                offer,
                to,
                from,
                from_name,
                kind,
            } => {
                self.signaling.call(offer, &to, from, from_name, kind).await?;
            }

            ClientMessage::AnswerCall { answer, to } => {
                self.signaling.answer(answer, &to).await?;
            }

            ClientMessage::IceCandidate { candidate, to } => {
                self.signaling.ice_candidate(candidate, &to).await?;
            }

            ClientMessage::EndCall { to } => {
                self.signaling.end_call(&to).await?;
            }
        }

        debug!("Handled event from {}", session.connection().id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ConnectionState;
    use crate::messages::{CallKind, ServerMessage, Status};
    use crate::store::MemoryStore;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn events(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    async fn send(server: &Server, session: &mut Session, value: serde_json::Value) {
        server.handle_text(session, &value.to_string()).await;
    }

    #[tokio::test]
    async fn chat_read_and_call_scenario() {
        let server = Server::new(Arc::new(MemoryStore::new()));
        let (mut a, mut a_rx) = server.lifecycle().connect().await;
        let (mut b, mut b_rx) = server.lifecycle().connect().await;

        send(&server, &mut a, json!({"event": "register", "data": "A"})).await;
        send(&server, &mut b, json!({"event": "register", "data": "B"})).await;
        events(&mut a_rx);
        events(&mut b_rx);

        send(&server, &mut a, json!({
            "event": "send_private_message",
            "data": {"senderId": "A", "receiverId": "B", "text": "hi", "senderLang": "en", "senderName": "Ann"}
        }))
        .await;
        let received = events(&mut b_rx);
        assert_eq!(received.len(), 1);
        let ServerMessage::ReceivePrivateMessage { text, sender_name, .. } = &received[0] else {
            panic!("unexpected event {:?}", received[0]);
        };
        assert_eq!(text.as_deref(), Some("hi"));
        assert_eq!(sender_name, "Ann");

        send(&server, &mut b, json!({"event": "mark_read", "data": {"userId": "B", "otherId": "A"}})).await;
        assert_eq!(events(&mut a_rx), vec![ServerMessage::MessagesRead { reader_id: "B".into() }]);

        send(&server, &mut a, json!({
            "event": "call_user",
            "data": {"offer": {"sdp": "x"}, "to": "B", "from": "A", "fromName": "Ann", "type": "audio"}
        }))
        .await;
        let received = events(&mut b_rx);
        assert!(matches!(
            &received[..],
            [ServerMessage::IncomingCall { kind: CallKind::Audio, .. }]
        ));

        send(&server, &mut b, json!({"event": "end_call", "data": {"to": "A"}})).await;
        assert_eq!(events(&mut a_rx), vec![ServerMessage::CallEnded]);
    }

    #[tokio::test]
    async fn malformed_events_are_dropped_without_closing() {
        let server = Server::new(Arc::new(MemoryStore::new()));
        let (mut a, mut a_rx) = server.lifecycle().connect().await;

        server.handle_text(&mut a, "not json").await;
        send(&server, &mut a, json!({"event": "typing", "data": {"senderId": "A"}})).await;
        send(&server, &mut a, json!({"event": "unknown_event", "data": {}})).await;
        send(&server, &mut a, json!({"event": "register", "data": ""})).await;
        assert_eq!(a.state(), &ConnectionState::Unregistered);

        send(&server, &mut a, json!({"event": "register", "data": "A"})).await;
        assert_eq!(a.state(), &ConnectionState::Registered("A".into()));
        assert_eq!(
            events(&mut a_rx),
            vec![ServerMessage::UserStatus { user_id: "A".into(), status: Status::Online, last_seen: None }]
        );
    }

    #[tokio::test]
    async fn unregistered_connection_cannot_be_reached() {
        let server = Server::new(Arc::new(MemoryStore::new()));
        let (mut a, _a_rx) = server.lifecycle().connect().await;
        let (_b, mut b_rx) = server.lifecycle().connect().await;
        send(&server, &mut a, json!({"event": "register", "data": "A"})).await;
        events(&mut b_rx);

        send(&server, &mut a, json!({"event": "ice_candidate", "data": {"candidate": {}, "to": "B"}})).await;
        send(&server, &mut a, json!({
            "event": "typing",
            "data": {"senderId": "A", "receiverId": "B", "isTyping": true}
        }))
        .await;
        assert!(events(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn disconnect_announces_offline_to_remaining_connections() {
        let server = Server::new(Arc::new(MemoryStore::new()));
        let (mut a, _a_rx) = server.lifecycle().connect().await;
        let (mut b, mut b_rx) = server.lifecycle().connect().await;
        send(&server, &mut a, json!({"event": "register", "data": "A"})).await;
        send(&server, &mut b, json!({"event": "register", "data": "B"})).await;
        events(&mut b_rx);

        server.lifecycle().disconnect(&mut a).await;

        let received = events(&mut b_rx);
        assert!(matches!(
            &received[..],
            [ServerMessage::UserStatus { user_id, status: Status::Offline, last_seen: Some(_) }] if user_id == "A"
        ));
        assert!(server.presence().resolve("A").await.is_none());
    }
}
