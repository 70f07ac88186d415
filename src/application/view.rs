//! Chat view state
//!
//! What a chat screen renders: the timeline of messages and presence
//! changes, plus the presence tracker behind the typing label and badge.

use crate::application::services::{HistoryEvent, PresenceOutcome, PresenceTracker};
use crate::domain::entities::{ChatEvent, PresenceAction, PresentUser};
use crate::domain::transport::HistoryDirection;
use crate::shared::error::HistoryError;

/// Append-only list of displayed chat events.
///
/// Live events and history pages are appended in the order they reach the
/// view; nothing is reordered by timestamp.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<ChatEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a live event
    pub fn push(&mut self, event: ChatEvent) {
        self.events.push(event);
    }

    /// Append one history page, oldest first.
    ///
    /// Backwards pages arrive newest first and are reversed.
    pub fn extend_history(&mut self, items: Vec<ChatEvent>, direction: HistoryDirection) {
        let mut items = items;
        if direction == HistoryDirection::Backwards {
            items.reverse();
        }
        self.events.extend(items);
    }

    pub fn events(&self) -> impl Iterator<Item = &ChatEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Render each event as one line of text.
    pub fn display_lines(&self) -> Vec<String> {
        self.events().filter_map(display_line).collect()
    }
}

fn display_line(event: &ChatEvent) -> Option<String> {
    match event {
        ChatEvent::Message(message) => Some(format!("{}: {}", message.sender(), message.text)),
        ChatEvent::Presence(presence) => match presence.action {
            PresenceAction::Enter => Some(format!("{} has entered the chat", presence.client_id)),
            PresenceAction::Leave => Some(format!("{} has left the chat", presence.client_id)),
            _ => None,
        },
    }
}

/// State of one chat screen.
#[derive(Debug, Clone, Default)]
pub struct ChatView {
    tracker: PresenceTracker,
    timeline: Timeline,
    epoch: u64,
    direction: HistoryDirection,
}

impl ChatView {
    pub fn new(direction: HistoryDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    /// Start over for a new chat entry. History batches from earlier
    /// entries are ignored from now on.
    pub fn reset(&mut self, epoch: u64, local_client_id: &str) {
        self.epoch = epoch;
        self.tracker = PresenceTracker::new(local_client_id);
        self.timeline.clear();
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Apply one live event.
    pub fn apply(&mut self, event: ChatEvent) {
        match &event {
            ChatEvent::Message(_) => self.timeline.push(event),
            ChatEvent::Presence(presence) => {
                if self.tracker.on_presence_event(presence) == PresenceOutcome::Displayed {
                    self.timeline.push(event);
                }
            }
        }
    }

    pub fn seed_present(&mut self, users: &[PresentUser]) {
        self.tracker.seed(users);
    }

    /// Merge a completed history fetch. Returns the fetch error, if any.
    pub fn merge_history(&mut self, event: HistoryEvent) -> Option<HistoryError> {
        if event.epoch() != self.epoch {
            tracing::debug!(
                batch_epoch = event.epoch(),
                current_epoch = self.epoch,
                "Discarding stale history batch"
            );
            return None;
        }

        let (items, error): (Vec<ChatEvent>, _) = match event {
            HistoryEvent::Messages { items, error, .. } => {
                (items.into_iter().map(ChatEvent::from).collect(), error)
            }
            HistoryEvent::Presence { items, error, .. } => {
                (items.into_iter().map(ChatEvent::from).collect(), error)
            }
        };
        self.timeline.extend_history(items, self.direction);
        error
    }

    pub fn tracker(&self) -> &PresenceTracker {
        &self.tracker
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }
}
