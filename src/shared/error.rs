//! Chat Session Error Types
//!
//! Centralized error handling for the session, presence and history layers.
//! Every transport failure is converted into one of these types at the point
//! where the asynchronous result is received.

use std::time::Duration;

/// Error reported by the realtime transport.
///
/// Mirrors the error info of a hosted pub/sub service: a numeric error code,
/// an HTTP-like status and a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct TransportError {
    pub code: u32,
    pub status: u16,
    pub message: String,
}

impl TransportError {
    pub fn new(code: u32, status: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }
}

/// Errors raised while establishing or holding a connection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    #[error("A connection is already active for client {0}")]
    AlreadyActive(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection attempt failed: {0}")]
    Transport(TransportError),

    #[error("Unable to attach channel {channel}: {source}")]
    Attach {
        channel: String,
        source: TransportError,
    },

    #[error("Unable to enter presence: {0}")]
    Enter(TransportError),

    #[error("Connection was disconnected. We will retry connecting again in {} seconds.", .retry_in.as_secs())]
    Disconnected { retry_in: Duration },

    #[error("Connection was suspended. We will retry connecting again in {} seconds.", .retry_in.as_secs())]
    Suspended { retry_in: Duration },
}

/// Errors raised when publishing a message or a presence update
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Rejected by transport: {0}")]
    Rejected(TransportError),
}

/// Errors raised while retrieving history. Always degrades to an empty result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("Unable to retrieve history: {0}")]
    Fetch(TransportError),
}

/// The transport reported the Failed state. Terminal until the app restarts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("We're sorry, the connection failed. Please restart the app.")]
pub struct FatalConnectionError {
    pub reason: Option<TransportError>,
}

/// Umbrella error handed to caller-supplied callbacks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Fatal(#[from] FatalConnectionError),
}

/// User-visible notice derived from an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Dismissible; the session keeps going
    Transient(String),
    /// Unrecoverable without restarting
    Fatal(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Transient(msg) | Notice::Fatal(msg) => msg,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Notice::Fatal(_))
    }
}

impl ChatError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::Fatal(_))
    }

    /// Convert into the notice shown to the user
    pub fn notice(&self) -> Notice {
        match self {
            ChatError::Fatal(e) => Notice::Fatal(e.to_string()),
            ChatError::Connect(e) => Notice::Transient(format!("Unable to connect: {}", e)),
            ChatError::Send(e) => Notice::Transient(format!("Unable to send: {}", e)),
            ChatError::History(e) => Notice::Transient(format!("Unable to retrieve history: {}", e)),
        }
    }
}
