//! Presence Tracker
//!
//! Maintains who is present and who is typing from the stream of presence
//! events, and formats the "who is typing" label.

use crate::domain::entities::{PresenceAction, PresenceMessage, PresentUser, TypingUser};
use crate::infrastructure::metrics;

/// What a presence event did to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Membership changed; the event belongs in the timeline
    Displayed,
    /// Typing set changed; nothing to display
    TypingChanged,
    Ignored,
}

/// Present and typing users of one session.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    local_client_id: String,
    /// Arrival order, no duplicates
    present: Vec<String>,
    /// Arrival order, no duplicates, never the local client
    typing: Vec<String>,
}

impl PresenceTracker {
    pub fn new(local_client_id: impl Into<String>) -> Self {
        Self {
            local_client_id: local_client_id.into(),
            present: Vec::new(),
            typing: Vec::new(),
        }
    }

    pub fn local_client_id(&self) -> &str {
        &self.local_client_id
    }

    /// Seed the present set from a presence snapshot, skipping ourselves.
    pub fn seed(&mut self, users: &[PresentUser]) {
        for user in users {
            if user.client_id != self.local_client_id {
                insert_unique(&mut self.present, &user.client_id);
            }
        }
    }

    /// Consume one presence event.
    pub fn on_presence_event(&mut self, event: &PresenceMessage) -> PresenceOutcome {
        metrics::record_presence_event(event.action.as_str());

        match event.action {
            PresenceAction::Enter => {
                insert_unique(&mut self.present, &event.client_id);
                PresenceOutcome::Displayed
            }
            PresenceAction::Leave => {
                self.present.retain(|id| id != &event.client_id);
                self.typing.retain(|id| id != &event.client_id);
                PresenceOutcome::Displayed
            }
            PresenceAction::Update => {
                if event.client_id == self.local_client_id {
                    return PresenceOutcome::Ignored;
                }
                match event.typing_state() {
                    Some(true) => insert_unique(&mut self.typing, &event.client_id),
                    Some(false) => self.typing.retain(|id| id != &event.client_id),
                    None => return PresenceOutcome::Ignored,
                }
                PresenceOutcome::TypingChanged
            }
            PresenceAction::Present | PresenceAction::Absent => PresenceOutcome::Ignored,
        }
    }

    /// Label shown above the input field; empty when nobody types.
    pub fn currently_typing_label(&self) -> String {
        typing_label(&self.typing)
    }

    /// Size of the present set, for the badge
    pub fn present_count(&self) -> usize {
        self.present.len()
    }

    pub fn present_users(&self) -> Vec<PresentUser> {
        self.present
            .iter()
            .map(|client_id| PresentUser {
                client_id: client_id.clone(),
            })
            .collect()
    }

    pub fn typing_users(&self) -> Vec<TypingUser> {
        self.typing
            .iter()
            .map(|client_id| TypingUser {
                client_id: client_id.clone(),
                is_typing: true,
            })
            .collect()
    }

    pub fn is_typing(&self, client_id: &str) -> bool {
        self.typing.iter().any(|id| id == client_id)
    }

    /// Handles offered by the mention picker, in present order.
    pub fn mention_candidates(&self) -> Vec<String> {
        self.present
            .iter()
            .map(|handle| {
                if *handle == self.local_client_id {
                    format!("@{} (me)", handle)
                } else {
                    format!("@{}", handle)
                }
            })
            .collect()
    }

    /// Text inserted into the input when the `index`th candidate is picked
    pub fn mention_text(&self, index: usize) -> Option<String> {
        self.present.get(index).map(|handle| format!("@{} ", handle))
    }
}

fn insert_unique(set: &mut Vec<String>, client_id: &str) {
    if !set.iter().any(|id| id == client_id) {
        set.push(client_id.to_string());
    }
}

/// Format the typing label for users in arrival order.
///
/// Four users take the general enumeration; only five or more are
/// summarised as "and other".
pub fn typing_label<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [] => String::new(),
        [one] => format!("{} is typing", one.as_ref()),
        [first, second] => format!("{} and {} are typing", first.as_ref(), second.as_ref()),
        [first, second, third, _, _, ..] => format!(
            "{}, {}, {} and other are typing",
            first.as_ref(),
            second.as_ref(),
            third.as_ref()
        ),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|name| name.as_ref()).collect();
            format!("{} and {} are typing", head.join(", "), last.as_ref())
        }
    }
}
