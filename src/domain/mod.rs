//! # Domain Layer
//!
//! Entities of a chat session and the transport contracts the session is
//! written against. Independent of any concrete transport.
//!
//! ## Structure
//!
//! - **entities**: Session, connection state, messages, presence
//! - **transport**: `RealtimeTransport` / `RealtimeChannel` traits

pub mod entities;
pub mod transport;

// Re-export commonly used types
pub use entities::*;
pub use transport::{RealtimeChannel, RealtimeTransport};
