//! Chat events delivered by the transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::ChatMessage;
use super::presence::PresenceMessage;

/// Union of everything that shows up in the chat timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "event", rename_all = "snake_case")]
pub enum ChatEvent {
    Message(ChatMessage),
    Presence(PresenceMessage),
}

impl ChatEvent {
    pub fn sender_client_id(&self) -> &str {
        match self {
            ChatEvent::Message(m) => &m.client_id,
            ChatEvent::Presence(p) => &p.client_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ChatEvent::Message(m) => m.timestamp,
            ChatEvent::Presence(p) => p.timestamp,
        }
    }

    /// Convert to JSON value for logging
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

impl From<ChatMessage> for ChatEvent {
    fn from(message: ChatMessage) -> Self {
        ChatEvent::Message(message)
    }
}

impl From<PresenceMessage> for ChatEvent {
    fn from(message: PresenceMessage) -> Self {
        ChatEvent::Presence(message)
    }
}
