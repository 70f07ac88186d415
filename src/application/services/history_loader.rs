//! History Loader
//!
//! Fetches bounded message and presence history when a session starts. The
//! two fetches are independent: each runs on its own task and reports its
//! own completion. A failed fetch degrades to an empty page plus an error.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::domain::entities::{ChatMessage, PresenceAction, PresenceMessage};
use crate::domain::transport::{HistoryParams, RealtimeChannel};
use crate::infrastructure::metrics;
use crate::shared::error::HistoryError;

/// Completion of one background history fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Messages {
        epoch: u64,
        items: Vec<ChatMessage>,
        error: Option<HistoryError>,
    },
    Presence {
        epoch: u64,
        items: Vec<PresenceMessage>,
        error: Option<HistoryError>,
    },
}

impl HistoryEvent {
    /// Chat entry the fetch was started for
    pub fn epoch(&self) -> u64 {
        match self {
            HistoryEvent::Messages { epoch, .. } | HistoryEvent::Presence { epoch, .. } => *epoch,
        }
    }

    pub fn error(&self) -> Option<&HistoryError> {
        match self {
            HistoryEvent::Messages { error, .. } | HistoryEvent::Presence { error, .. } => {
                error.as_ref()
            }
        }
    }
}

/// Both history pages, joined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub messages: Vec<ChatMessage>,
    pub presence: Vec<PresenceMessage>,
    pub errors: Vec<HistoryError>,
}

/// Loads history pages with fixed parameters.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLoader {
    params: HistoryParams,
}

impl HistoryLoader {
    pub fn new(params: HistoryParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> HistoryParams {
        self.params
    }

    /// Fetch one page of message history
    pub async fn fetch_messages(
        &self,
        channel: &dyn RealtimeChannel,
    ) -> Result<Vec<ChatMessage>, HistoryError> {
        let started = Instant::now();
        let result = channel
            .history(self.params)
            .await
            .map(|page| page.into_items())
            .map_err(HistoryError::Fetch);

        metrics::record_history_load("messages", result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!(error = %e, "Message history retrieval failed");
        }
        result
    }

    /// Fetch one page of presence history, without Update entries
    pub async fn fetch_presence(
        &self,
        channel: &dyn RealtimeChannel,
    ) -> Result<Vec<PresenceMessage>, HistoryError> {
        let started = Instant::now();
        let result = channel
            .presence_history(self.params)
            .await
            .map(|page| {
                page.into_items()
                    .into_iter()
                    .filter(|p| p.action != PresenceAction::Update)
                    .collect::<Vec<_>>()
            })
            .map_err(HistoryError::Fetch);

        metrics::record_history_load("presence", result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!(error = %e, "Presence history retrieval failed");
        }
        result
    }

    /// Run both fetches concurrently and wait for both.
    pub async fn load(&self, channel: &dyn RealtimeChannel) -> HistorySnapshot {
        let (messages, presence) =
            futures::join!(self.fetch_messages(channel), self.fetch_presence(channel));

        let mut snapshot = HistorySnapshot::default();
        match messages {
            Ok(items) => snapshot.messages = items,
            Err(e) => snapshot.errors.push(e),
        }
        match presence {
            Ok(items) => snapshot.presence = items,
            Err(e) => snapshot.errors.push(e),
        }
        snapshot
    }

    /// Start both fetches as background tasks. Each reports through
    /// `on_complete` exactly once, tagged with `epoch`.
    pub fn spawn<F>(
        &self,
        channel: Arc<dyn RealtimeChannel>,
        epoch: u64,
        on_complete: F,
    ) -> [JoinHandle<()>; 2]
    where
        F: Fn(HistoryEvent) + Clone + Send + Sync + 'static,
    {
        let loader = *self;

        let messages = {
            let channel = channel.clone();
            let on_complete = on_complete.clone();
            tokio::spawn(async move {
                let (items, error) = split(loader.fetch_messages(channel.as_ref()).await);
                on_complete(HistoryEvent::Messages { epoch, items, error });
            })
        };

        let presence = tokio::spawn(async move {
            let (items, error) = split(loader.fetch_presence(channel.as_ref()).await);
            on_complete(HistoryEvent::Presence { epoch, items, error });
        });

        [messages, presence]
    }
}

fn split<T>(result: Result<Vec<T>, HistoryError>) -> (Vec<T>, Option<HistoryError>) {
    match result {
        Ok(items) => (items, None),
        Err(e) => (Vec::new(), Some(e)),
    }
}
