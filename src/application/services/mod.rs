//! Application Services
//!
//! Services that drive one chat session on top of the transport traits.
//!
//! ## Available Services
//!
//! - **SessionManager**: Connection lifecycle, attach, publish, presence updates
//! - **PresenceTracker**: Present and typing users, typing label, mentions
//! - **HistoryLoader**: Bounded message and presence history on entry
//! - **TypingDebouncer**: Start/stop typing notifications from text changes

pub mod history_loader;
pub mod presence_tracker;
pub mod session_manager;
pub mod typing_debouncer;

pub use history_loader::{HistoryEvent, HistoryLoader, HistorySnapshot};
pub use presence_tracker::{typing_label, PresenceOutcome, PresenceTracker};
pub use session_manager::{ConnectionCallback, EventStream, SessionManager};
pub use typing_debouncer::{TypingDebouncer, TypingNotifier};
