//! Chat session entity.
//!
//! One session exists per connection attempt. Its state only ever changes in
//! response to a transport-reported state change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connection::{ConnectionState, ConnectionStateChange};

/// Represents the single active chat session of this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique per connection attempt
    pub session_id: Uuid,

    /// Local client id (the user's handle)
    pub client_id: String,

    /// Channel the session joins once connected
    pub channel_name: String,

    /// Last state reported by the transport
    pub state: ConnectionState,

    /// When the connection attempt started
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session in the Initialized state.
    pub fn new(client_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            client_id: client_id.into(),
            channel_name: channel_name.into(),
            state: ConnectionState::Initialized,
            created_at: Utc::now(),
        }
    }

    /// Apply a transport state change.
    ///
    /// Returns `false` when the transition is not a legal successor of the
    /// current state. The state is updated either way.
    pub fn apply(&mut self, change: &ConnectionStateChange) -> bool {
        let legal = self.state.can_transition_to(change.current);
        self.state = change.current;
        legal
    }

    /// Still holding (or acquiring) a connection
    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
