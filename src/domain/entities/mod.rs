//! # Domain Entities
//!
//! Core domain entities of a realtime chat session.
//!
//! - **ConnectionState**: Lifecycle states reported by the transport
//! - **Session**: The single active session of this client
//! - **ChatMessage**: A message published on the channel
//! - **PresenceMessage**: Enter/update/leave events and snapshot entries
//! - **ChatEvent**: Union of messages and presence events in the timeline

mod connection;
mod event;
mod message;
mod presence;
mod session;

pub use connection::{ConnectionState, ConnectionStateChange};
pub use event::ChatEvent;
pub use message::{ChatMessage, OutgoingMessage};
pub use presence::{PresenceAction, PresenceData, PresenceMessage, PresentUser, TypingUser};
pub use session::Session;
