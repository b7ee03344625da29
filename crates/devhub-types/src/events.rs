use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events pushed over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// Handshake accepted and presence registered
    Ready { user_id: String },

    /// A chat message addressed to this user
    NewMessage(MessagePayload),
}

/// Stored messages come from the REST send path; relayed ones are whatever
/// a client handed to `sendMessage`, passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    Stored(Box<Message>),
    Relayed(serde_json::Value),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayCommand {
    /// Relay a message to another user without persisting it
    SendMessage {
        receiver_id: String,
        message: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_command_uses_camel_case_fields() {
        let raw = r#"{"type":"sendMessage","data":{"receiverId":"u2","message":{"content":"hi"}}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        let GatewayCommand::SendMessage { receiver_id, message } = cmd;
        assert_eq!(receiver_id, "u2");
        assert_eq!(message["content"], "hi");
    }

    #[test]
    fn relayed_payload_is_forwarded_verbatim() {
        let event = GatewayEvent::NewMessage(MessagePayload::Relayed(
            serde_json::json!({"content": "hi", "extra": 1}),
        ));
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "newMessage");
        assert_eq!(v["data"], serde_json::json!({"content": "hi", "extra": 1}));
    }

    #[test]
    fn ready_event_shape() {
        let v = serde_json::to_value(GatewayEvent::Ready { user_id: "u1".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"type": "ready", "data": {"userId": "u1"}}));
    }
}
