//! Chat message entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message published on the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Transport-assigned message id
    pub id: String,

    /// Client id of the publishing connection
    #[serde(rename = "clientId")]
    pub client_id: String,

    /// Event name; the sender's handle
    pub name: Option<String>,

    /// Message body
    #[serde(rename = "data")]
    pub text: String,

    /// Transport timestamp
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Handle to display for this message, falling back to the client id.
    pub fn sender(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.client_id)
    }
}

/// A message about to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Event name; the sender's handle
    pub name: String,

    /// Message body
    #[serde(rename = "data")]
    pub text: String,
}
