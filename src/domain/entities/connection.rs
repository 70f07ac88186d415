//! Connection state entity.
//!
//! The states a realtime connection moves through, as reported by the
//! transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::error::TransportError;

/// Connection lifecycle states.
///
/// ```text
/// Initialized -> Connecting -> Connected -> Disconnected | Suspended | Closing -> Closed | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Initialized,
    Connecting,
    Connected,
    /// Transient; the transport retries within a short horizon
    Disconnected,
    /// Transient; the transport retries within a longer horizon
    Suspended,
    Closing,
    Closed,
    /// Terminal
    Failed,
}

impl ConnectionState {
    /// Convert from string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "initialized" => Some(Self::Initialized),
            "connecting" => Some(Self::Connecting),
            "connected" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "suspended" => Some(Self::Suspended),
            "closing" => Some(Self::Closing),
            "closed" => Some(Self::Closed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Suspended => "suspended",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// States the session reports to its owner. Internal transitions
    /// (initialized, connecting, closing, closed) are not reported.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Disconnected | Self::Suspended | Self::Failed
        )
    }

    /// Closed or Failed: no connection is held and a new one may be opened.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Whether the transport is expected to retry on its own
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Suspended)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        if *self == next {
            return true;
        }

        match self {
            Initialized => matches!(next, Connecting | Closing | Closed | Failed),
            Connecting => matches!(
                next,
                Connected | Disconnected | Suspended | Closing | Closed | Failed
            ),
            Connected => matches!(next, Disconnected | Suspended | Closing | Failed),
            Disconnected => matches!(
                next,
                Connecting | Connected | Suspended | Closing | Closed | Failed
            ),
            Suspended => matches!(next, Connecting | Connected | Closing | Closed | Failed),
            Closing => matches!(next, Closed | Failed),
            Closed => matches!(next, Connecting | Failed),
            Failed => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state transition reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    pub reason: Option<TransportError>,
    /// Transport retry horizon for transient states
    pub retry_in: Option<Duration>,
}

impl ConnectionStateChange {
    pub fn new(previous: ConnectionState, current: ConnectionState) -> Self {
        Self {
            previous,
            current,
            reason: None,
            retry_in: None,
        }
    }

    pub fn with_reason(mut self, reason: TransportError) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_retry_in(mut self, retry_in: Duration) -> Self {
        self.retry_in = Some(retry_in);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_states() {
        let reported: Vec<_> = [
            ConnectionState::Initialized,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Suspended,
            ConnectionState::Closing,
            ConnectionState::Closed,
            ConnectionState::Failed,
        ]
        .into_iter()
        .filter(|s| s.is_reported())
        .collect();

        assert_eq!(
            reported,
            vec![
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Suspended,
                ConnectionState::Failed,
            ]
        );
    }

    #[test]
    fn test_failed_has_no_successor() {
        assert!(!ConnectionState::Failed.can_transition_to(ConnectionState::Connecting));
        assert!(!ConnectionState::Failed.can_transition_to(ConnectionState::Connected));
    }

    #[test]
    fn test_closing_only_leads_to_closed_or_failed() {
        assert!(ConnectionState::Closing.can_transition_to(ConnectionState::Closed));
        assert!(!ConnectionState::Closing.can_transition_to(ConnectionState::Connected));
    }

    #[test]
    fn test_round_trip_names() {
        for state in [ConnectionState::Suspended, ConnectionState::Closed] {
            assert_eq!(ConnectionState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(ConnectionState::from_str("bogus"), None);
    }
}
