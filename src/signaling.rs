use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::error::RelayError;
use crate::messages::{CallKind, ServerMessage};
use crate::presence::PresenceRegistry;
use crate::relay::require;

/// Forwards call setup envelopes between two identities. Payloads are never
/// inspected and no call state is kept; an offline target just drops the
/// envelope and the caller finds out by timing out.
#[derive(Clone)]
pub struct CallSignaling {
    presence: Arc<PresenceRegistry>,
}

impl CallSignaling {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        CallSignaling { presence }
    }

    pub async fn call(
        &self,
        offer: Value,
        to: &str,
        from: String,
        from_name: String,
        kind: CallKind,
    ) -> Result<bool, RelayError> {
        self.forward(to, ServerMessage::IncomingCall {
            offer,
            from,
            from_name,
            kind,
        })
        .await
    }

    pub async fn answer(&self, answer: Value, to: &str) -> Result<bool, RelayError> {
        self.forward(to, ServerMessage::CallAccepted { answer }).await
    }

    pub async fn ice_candidate(&self, candidate: Value, to: &str) -> Result<bool, RelayError> {
        self.forward(to, ServerMessage::IceCandidate { candidate }).await
    }

    pub async fn end_call(&self, to: &str) -> Result<bool, RelayError> {
        self.forward(to, ServerMessage::CallEnded).await
    }

    async fn forward(&self, to: &str, envelope: ServerMessage) -> Result<bool, RelayError> {
        require("to", to)?;

        match self.presence.resolve(to).await {
            Some(connection) => Ok(connection.send(envelope)),
            None => {
                debug!("Dropping {} for {}, not connected", envelope.event_name(), to);
                Ok(false)
            }
        }
    }
}
