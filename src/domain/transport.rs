//! Realtime transport contracts.
//!
//! The session layer never talks to a concrete service. It drives these
//! traits: a connection that reports state changes, and channels that support
//! attach, publish/subscribe, presence and bounded history. Listener
//! registration returns a [`Subscription`] handle used to unsubscribe.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::entities::{
    ChatEvent, ChatMessage, ConnectionState, ConnectionStateChange, OutgoingMessage, PresenceData,
    PresenceMessage,
};
use crate::shared::error::TransportError;

/// Sink a channel delivers subscribed events into
pub type EventSink = mpsc::UnboundedSender<ChatEvent>;

/// Stream of connection state changes for one connection
pub type StateChanges = mpsc::UnboundedReceiver<ConnectionStateChange>;

/// Options for opening a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub client_id: String,
    pub auth_url: String,
    pub echo_messages: bool,
}

/// Order of a history page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection {
    /// Newest first
    #[default]
    Backwards,
    /// Oldest first
    Forwards,
}

impl HistoryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backwards => "backwards",
            Self::Forwards => "forwards",
        }
    }
}

/// History query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryParams {
    pub limit: u32,
    pub direction: HistoryDirection,
    /// Only include entries published before the channel attached
    pub until_attach: bool,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            limit: 50,
            direction: HistoryDirection::Backwards,
            until_attach: true,
        }
    }
}

/// One page of a history query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, has_next: bool) -> Self {
        Self { items, has_next }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Kind of listener a subscription refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Messages,
    Presence,
}

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub id: Uuid,
    pub kind: SubscriptionKind,
}

impl Subscription {
    pub fn new(kind: SubscriptionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }
}

/// A client connection to the realtime service.
#[cfg_attr(test, mockall::automock)]
pub trait RealtimeTransport: Send + Sync {
    /// Open the connection. State changes, starting with Connecting, arrive
    /// on the returned stream for the lifetime of the connection, including
    /// after `reconnect`.
    fn connect(&self, options: &ClientOptions) -> Result<StateChanges, TransportError>;

    /// Re-open a closed or dropped connection
    fn reconnect(&self);

    /// Close the connection
    fn close(&self);

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Get (or create) a channel handle by name
    fn channel(&self, name: &str) -> Arc<dyn RealtimeChannel>;
}

/// A named pub/sub channel with presence and history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    fn name(&self) -> String;

    async fn attach(&self) -> Result<(), TransportError>;

    fn subscribe(&self, sink: EventSink) -> Subscription;

    fn unsubscribe(&self, subscription: Subscription);

    async fn publish(&self, message: OutgoingMessage) -> Result<(), TransportError>;

    async fn history(
        &self,
        params: HistoryParams,
    ) -> Result<PaginatedResult<ChatMessage>, TransportError>;

    async fn presence_enter(&self, data: Option<PresenceData>) -> Result<(), TransportError>;

    async fn presence_update(&self, data: PresenceData) -> Result<(), TransportError>;

    fn presence_subscribe(&self, sink: EventSink) -> Subscription;

    fn presence_unsubscribe(&self, subscription: Subscription);

    /// Current presence members
    async fn presence_get(&self) -> Result<Vec<PresenceMessage>, TransportError>;

    async fn presence_history(
        &self,
        params: HistoryParams,
    ) -> Result<PaginatedResult<PresenceMessage>, TransportError>;
}
