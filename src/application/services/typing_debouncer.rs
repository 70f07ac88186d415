//! Typing Debouncer
//!
//! Turns text-change events into start/stop typing notifications. The first
//! change sends start-typing; every change re-arms a single stop timer, so
//! stop-typing fires one quiet period after the last keystroke.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::shared::error::{ChatError, SendError};

/// Receiver of typing state changes
#[async_trait]
pub trait TypingNotifier: Send + Sync + 'static {
    async fn notify_typing(&self, is_typing: bool) -> Result<(), SendError>;
}

#[derive(Default)]
struct DebounceState {
    typing: bool,
    /// Bumped on every re-arm; a stop task only acts if it is still current
    generation: u64,
    pending_stop: Option<JoinHandle<()>>,
}

/// Debounces typing notifications for the local user.
pub struct TypingDebouncer {
    notifier: Arc<dyn TypingNotifier>,
    quiet_period: Duration,
    state: Arc<Mutex<DebounceState>>,
    errors: Option<mpsc::UnboundedSender<ChatError>>,
}

impl TypingDebouncer {
    pub fn new(notifier: Arc<dyn TypingNotifier>, quiet_period: Duration) -> Self {
        Self {
            notifier,
            quiet_period,
            state: Arc::new(Mutex::new(DebounceState::default())),
            errors: None,
        }
    }

    /// Forward notification failures to `errors`
    pub fn with_error_sink(mut self, errors: mpsc::UnboundedSender<ChatError>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Handle one text change from the input field.
    pub fn on_text_changed(&self) {
        let mut state = self.state.lock();

        if !state.typing {
            state.typing = true;
            let notifier = self.notifier.clone();
            let errors = self.errors.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify_typing(true).await {
                    tracing::warn!(error = %e, "Unable to send typing notification");
                    if let Some(errors) = errors {
                        let _ = errors.send(e.into());
                    }
                }
            });
        }

        if let Some(pending) = state.pending_stop.take() {
            pending.abort();
        }
        state.generation += 1;

        let generation = state.generation;
        let shared = self.state.clone();
        let notifier = self.notifier.clone();
        let quiet_period = self.quiet_period;
        state.pending_stop = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.typing = false;
                state.pending_stop = None;
            }
            if let Err(e) = notifier.notify_typing(false).await {
                tracing::warn!(error = %e, "Unable to send stop-typing notification");
            }
        }));
    }

    /// Whether a start-typing notification is outstanding
    pub fn is_typing(&self) -> bool {
        self.state.lock().typing
    }

    /// Drop the pending stop timer without notifying.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending_stop.take() {
            pending.abort();
        }
        state.generation += 1;
        state.typing = false;
    }
}

impl Drop for TypingDebouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.state.lock().pending_stop.take() {
            pending.abort();
        }
    }
}
