use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Audio,
    Video,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
}

/// Events a client sends. Framed as `{"event": ..., "data": ...}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "register")]
    Register(String),
    #[serde(rename = "send_private_message", rename_all = "camelCase")]
    SendPrivateMessage {
        sender_id: String,
        receiver_id: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        image_data: Option<String>,
        sender_lang: String,
        sender_name: String,
    },
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        sender_id: String,
        receiver_id: String,
        is_typing: bool,
    },
    #[serde(rename = "mark_read", rename_all = "camelCase")]
    MarkRead { user_id: String, other_id: String },
    #[serde(rename = "call_user", rename_all = "camelCase")]
    CallUser {
        offer: Value,
        to: String,
        from: String,
        from_name: String,
        #[serde(rename = "type")]
        kind: CallKind,
    },
    #[serde(rename = "answer_call")]
    AnswerCall { answer: Value, to: String },
    #[serde(rename = "ice_candidate")]
    IceCandidate { candidate: Value, to: String },
    #[serde(rename = "end_call")]
    EndCall { to: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "receive_private_message", rename_all = "camelCase")]
    ReceivePrivateMessage {
        id: String,
        sender_id: String,
        sender_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_data: Option<String>,
        sender_lang: String,
        timestamp: u64,
    },
    #[serde(rename = "typing_status", rename_all = "camelCase")]
    TypingStatus { sender_id: String, is_typing: bool },
    #[serde(rename = "messages_read", rename_all = "camelCase")]
    MessagesRead { reader_id: String },
    #[serde(rename = "user_status", rename_all = "camelCase")]
    UserStatus {
        user_id: String,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen: Option<u64>,
    },
    #[serde(rename = "incoming_call", rename_all = "camelCase")]
    IncomingCall {
        offer: Value,
        from: String,
        from_name: String,
        #[serde(rename = "type")]
        kind: CallKind,
    },
    #[serde(rename = "call_accepted")]
    CallAccepted { answer: Value },
    #[serde(rename = "ice_candidate")]
    IceCandidate { candidate: Value },
    #[serde(rename = "call_ended")]
    CallEnded,
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::ReceivePrivateMessage { .. } => "receive_private_message",
            ServerMessage::TypingStatus { .. } => "typing_status",
            ServerMessage::MessagesRead { .. } => "messages_read",
            ServerMessage::UserStatus { .. } => "user_status",
            ServerMessage::IncomingCall { .. } => "incoming_call",
            ServerMessage::CallAccepted { .. } => "call_accepted",
            ServerMessage::IceCandidate { .. } => "ice_candidate",
            ServerMessage::CallEnded => "call_ended",
        }
    }
}
