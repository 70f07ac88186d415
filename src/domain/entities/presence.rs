//! Presence entities.
//!
//! Presence is the set of client ids attached to a channel, announced through
//! enter/update/leave events. Typing state rides on presence updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Presence event actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    /// Member is not present (snapshot sync)
    Absent,
    /// Member is present (snapshot sync)
    Present,
    Enter,
    Leave,
    /// Member data changed; carries typing state
    Update,
}

impl PresenceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Present => "present",
            Self::Enter => "enter",
            Self::Leave => "leave",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for PresenceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Member data attached to presence enter/update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceData {
    #[serde(rename = "isTyping")]
    pub is_typing: bool,
}

impl PresenceData {
    pub fn typing(is_typing: bool) -> Self {
        Self { is_typing }
    }
}

/// A presence event or presence snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    pub id: String,

    #[serde(rename = "clientId")]
    pub client_id: String,

    pub action: PresenceAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PresenceData>,

    pub timestamp: DateTime<Utc>,
}

impl PresenceMessage {
    /// Typing flag carried by an update, if any
    pub fn typing_state(&self) -> Option<bool> {
        match self.action {
            PresenceAction::Update => self.data.map(|d| d.is_typing),
            _ => None,
        }
    }
}

/// A user currently present on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresentUser {
    pub client_id: String,
}

impl From<&PresenceMessage> for PresentUser {
    fn from(message: &PresenceMessage) -> Self {
        Self {
            client_id: message.client_id.clone(),
        }
    }
}

/// A remote user's typing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUser {
    pub client_id: String,
    pub is_typing: bool,
}
