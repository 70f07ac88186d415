//! Application Layer
//!
//! Session services and the view state they feed. This layer sits between
//! the transport contracts of the domain layer and the chat client.

pub mod services;
pub mod view;

pub use view::{ChatView, Timeline};
