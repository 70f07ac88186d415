//! In-Process Transport
//!
//! A realtime hub that lives in the current process. Every [`MemoryTransport`]
//! is one client connection; channels with the same name on the same
//! [`MemoryHub`] share their message log, presence set and subscribers.
//! Used by the demo binary and the test suite.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::entities::{
    ChatEvent, ChatMessage, ConnectionState, ConnectionStateChange, OutgoingMessage, PresenceAction,
    PresenceData, PresenceMessage,
};
use crate::domain::transport::{
    ClientOptions, EventSink, HistoryDirection, HistoryParams, PaginatedResult, RealtimeChannel,
    RealtimeTransport, StateChanges, Subscription, SubscriptionKind,
};
use crate::shared::error::TransportError;

/// Operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Connect,
    Attach,
    Publish,
    PresenceEnter,
    PresenceUpdate,
    PresenceGet,
    History,
    PresenceHistory,
}

impl FaultPoint {
    fn error(&self) -> TransportError {
        match self {
            FaultPoint::Connect => TransportError::new(80000, 503, "connection refused"),
            FaultPoint::Attach => TransportError::new(90001, 500, "channel attach failed"),
            FaultPoint::Publish => TransportError::new(40160, 401, "publish not permitted"),
            FaultPoint::PresenceEnter | FaultPoint::PresenceUpdate => {
                TransportError::new(91005, 400, "presence operation rejected")
            }
            FaultPoint::PresenceGet => TransportError::new(91004, 500, "presence sync failed"),
            FaultPoint::History | FaultPoint::PresenceHistory => {
                TransportError::new(50000, 500, "history unavailable")
            }
        }
    }
}

/// Error for operations on a channel that is not attached
fn not_attached(channel: &str) -> TransportError {
    TransportError::new(90001, 400, format!("channel {} is not attached", channel))
}

/// A registered listener and the connection that owns it
struct Subscriber {
    connection_id: Uuid,
    echo: bool,
    sink: EventSink,
}

impl Subscriber {
    /// Whether an event published by `origin` reaches this listener
    fn receives_from(&self, origin: Option<Uuid>) -> bool {
        self.echo || origin != Some(self.connection_id)
    }
}

/// Shared state of one named channel
struct HubChannel {
    name: String,
    serial: AtomicU64,
    messages: RwLock<Vec<(u64, ChatMessage)>>,
    presence_log: RwLock<Vec<(u64, PresenceMessage)>>,
    /// Present members in entry order: (connection id, client id, data)
    members: RwLock<Vec<(Uuid, String, Option<PresenceData>)>>,
    message_subscribers: DashMap<Uuid, Subscriber>,
    presence_subscribers: DashMap<Uuid, Subscriber>,
}

impl HubChannel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            serial: AtomicU64::new(0),
            messages: RwLock::new(Vec::new()),
            presence_log: RwLock::new(Vec::new()),
            members: RwLock::new(Vec::new()),
            message_subscribers: DashMap::new(),
            presence_subscribers: DashMap::new(),
        }
    }

    fn next_serial(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_serial(&self) -> u64 {
        self.serial.load(Ordering::SeqCst)
    }

    /// Send an event to every sink, dropping sinks whose receiver is gone.
    /// Connections with echo off do not get their own messages back.
    fn fan_out(subscribers: &DashMap<Uuid, Subscriber>, origin: Option<Uuid>, event: ChatEvent) {
        let mut closed = Vec::new();
        for entry in subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.receives_from(origin) {
                continue;
            }
            if subscriber.sink.send(event.clone()).is_err() {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            subscribers.remove(&id);
        }
    }

    fn publish(&self, connection_id: Uuid, client_id: &str, message: OutgoingMessage) {
        let serial = self.next_serial();
        let message = ChatMessage {
            id: format!("{}:{}", self.name, serial),
            client_id: client_id.to_string(),
            name: Some(message.name),
            text: message.text,
            timestamp: Utc::now(),
        };
        self.messages.write().push((serial, message.clone()));
        Self::fan_out(&self.message_subscribers, Some(connection_id), ChatEvent::Message(message));
    }

    fn record_presence(&self, client_id: &str, action: PresenceAction, data: Option<PresenceData>) {
        let serial = self.next_serial();
        let message = PresenceMessage {
            id: format!("{}:{}", self.name, serial),
            client_id: client_id.to_string(),
            action,
            data,
            timestamp: Utc::now(),
        };
        self.presence_log.write().push((serial, message.clone()));
        Self::fan_out(&self.presence_subscribers, None, ChatEvent::Presence(message));
    }

    /// Enter a new member or update an existing one. An update from a
    /// non-member is recorded as an enter.
    fn upsert_member(&self, connection_id: Uuid, client_id: &str, data: Option<PresenceData>) {
        let action = {
            let mut members = self.members.write();
            match members.iter_mut().find(|(conn, _, _)| *conn == connection_id) {
                Some(member) => {
                    member.2 = data;
                    PresenceAction::Update
                }
                None => {
                    members.push((connection_id, client_id.to_string(), data));
                    PresenceAction::Enter
                }
            }
        };
        self.record_presence(client_id, action, data);
    }

    fn leave(&self, connection_id: Uuid) {
        let removed = {
            let mut members = self.members.write();
            members
                .iter()
                .position(|(conn, _, _)| *conn == connection_id)
                .map(|idx| members.remove(idx))
        };
        if let Some((_, client_id, data)) = removed {
            self.record_presence(&client_id, PresenceAction::Leave, data);
        }
    }

    fn page<T: Clone>(
        log: &[(u64, T)],
        params: HistoryParams,
        until: Option<u64>,
    ) -> PaginatedResult<T> {
        let eligible: Vec<&T> = log
            .iter()
            .filter(|(serial, _)| until.map_or(true, |bound| *serial <= bound))
            .map(|(_, item)| item)
            .collect();

        let limit = params.limit as usize;
        let has_next = eligible.len() > limit;
        let items: Vec<T> = match params.direction {
            HistoryDirection::Backwards => eligible.into_iter().rev().take(limit).cloned().collect(),
            HistoryDirection::Forwards => eligible.into_iter().take(limit).cloned().collect(),
        };

        PaginatedResult::new(items, has_next)
    }
}

/// In-process realtime hub shared by all connections.
#[derive(Default)]
pub struct MemoryHub {
    channels: DashMap<String, Arc<HubChannel>>,
    faults: Mutex<HashSet<FaultPoint>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent call of `point` fail
    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults.lock().insert(point);
    }

    pub fn clear_fault(&self, point: FaultPoint) {
        self.faults.lock().remove(&point);
    }

    fn check(&self, point: FaultPoint) -> Result<(), TransportError> {
        if self.faults.lock().contains(&point) {
            return Err(point.error());
        }
        Ok(())
    }

    fn hub_channel(&self, name: &str) -> Arc<HubChannel> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(HubChannel::new(name)))
            .clone()
    }

    /// Number of live message subscribers on a channel
    pub fn message_subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|c| c.message_subscribers.len())
            .unwrap_or(0)
    }

    /// Number of live presence subscribers on a channel
    pub fn presence_subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|c| c.presence_subscribers.len())
            .unwrap_or(0)
    }

    /// Client ids currently present on a channel
    pub fn present_client_ids(&self, channel: &str) -> Vec<String> {
        self.channels
            .get(channel)
            .map(|c| c.members.read().iter().map(|(_, id, _)| id.clone()).collect())
            .unwrap_or_default()
    }
}

/// Per-connection state
struct ConnectionInner {
    connection_id: Uuid,
    client_id: String,
    echo_messages: bool,
    state: ConnectionState,
    changes: Option<mpsc::UnboundedSender<ConnectionStateChange>>,
    channels: Vec<Arc<MemoryChannel>>,
}

/// One client's connection to a [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    inner: Arc<Mutex<ConnectionInner>>,
}

impl MemoryTransport {
    pub fn new(hub: Arc<MemoryHub>) -> Self {
        Self {
            hub,
            inner: Arc::new(Mutex::new(ConnectionInner {
                connection_id: Uuid::new_v4(),
                client_id: String::new(),
                echo_messages: true,
                state: ConnectionState::Initialized,
                changes: None,
                channels: Vec::new(),
            })),
        }
    }

    fn transition(&self, next: ConnectionState, reason: Option<TransportError>, retry_in: Option<Duration>) {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        inner.state = next;

        let mut change = ConnectionStateChange::new(previous, next);
        if let Some(reason) = reason {
            change = change.with_reason(reason);
        }
        if let Some(retry_in) = retry_in {
            change = change.with_retry_in(retry_in);
        }

        if let Some(changes) = &inner.changes {
            let _ = changes.send(change);
        }
        tracing::trace!(client_id = %inner.client_id, %previous, current = %next, "Connection state change");
    }

    /// Leave presence and detach on every channel of this connection
    fn release_channels(&self) {
        let (connection_id, channels) = {
            let inner = self.inner.lock();
            (inner.connection_id, inner.channels.clone())
        };
        for channel in channels {
            channel.hub_channel.leave(connection_id);
            channel.detach();
        }
    }

    /// Simulate a transport-side state change (dropped link, suspension,
    /// fatal failure).
    pub fn force_state(&self, state: ConnectionState, reason: Option<TransportError>) {
        let retry_in = match state {
            ConnectionState::Disconnected => Some(Duration::from_secs(15)),
            ConnectionState::Suspended => Some(Duration::from_secs(30)),
            _ => None,
        };
        if state == ConnectionState::Failed {
            self.release_channels();
        }
        self.transition(state, reason, retry_in);
    }
}

impl RealtimeTransport for MemoryTransport {
    fn connect(&self, options: &ClientOptions) -> Result<StateChanges, TransportError> {
        self.hub.check(FaultPoint::Connect)?;
        if options.client_id.is_empty() {
            return Err(TransportError::new(40012, 400, "client id must not be empty"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock();
            inner.client_id = options.client_id.clone();
            inner.echo_messages = options.echo_messages;
            inner.connection_id = Uuid::new_v4();
            inner.state = ConnectionState::Initialized;
            inner.changes = Some(tx);
            inner.channels.clear();
        }

        self.transition(ConnectionState::Connecting, None, None);
        self.transition(ConnectionState::Connected, None, None);
        Ok(rx)
    }

    fn reconnect(&self) {
        let state = self.inner.lock().state;
        if state == ConnectionState::Closed || state.is_transient() {
            self.transition(ConnectionState::Connecting, None, None);
            self.transition(ConnectionState::Connected, None, None);
        }
    }

    fn close(&self) {
        let state = self.inner.lock().state;
        if matches!(
            state,
            ConnectionState::Closing | ConnectionState::Closed | ConnectionState::Failed
        ) {
            return;
        }
        self.transition(ConnectionState::Closing, None, None);
        self.release_channels();
        self.transition(ConnectionState::Closed, None, None);
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn channel(&self, name: &str) -> Arc<dyn RealtimeChannel> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.channels.iter().find(|c| c.hub_channel.name == name) {
            return existing.clone();
        }

        let channel = Arc::new(MemoryChannel {
            hub: self.hub.clone(),
            hub_channel: self.hub.hub_channel(name),
            connection: self.inner.clone(),
            connection_id: inner.connection_id,
            client_id: inner.client_id.clone(),
            attach_serial: Mutex::new(None),
        });
        inner.channels.push(channel.clone());
        channel
    }
}

/// A connection's handle on a hub channel
pub struct MemoryChannel {
    hub: Arc<MemoryHub>,
    hub_channel: Arc<HubChannel>,
    connection: Arc<Mutex<ConnectionInner>>,
    connection_id: Uuid,
    client_id: String,
    /// Hub serial at the moment of attach; bounds until-attach history
    attach_serial: Mutex<Option<u64>>,
}

impl MemoryChannel {
    fn detach(&self) {
        *self.attach_serial.lock() = None;
    }

    fn ensure_attached(&self) -> Result<u64, TransportError> {
        (*self.attach_serial.lock()).ok_or_else(|| not_attached(&self.hub_channel.name))
    }

    fn subscriber(&self, sink: EventSink) -> Subscriber {
        Subscriber {
            connection_id: self.connection_id,
            echo: self.connection.lock().echo_messages,
            sink,
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        match self.connection.lock().state {
            ConnectionState::Connected => Ok(()),
            state => Err(TransportError::new(
                80003,
                400,
                format!("connection is {}", state),
            )),
        }
    }
}

#[async_trait]
impl RealtimeChannel for MemoryChannel {
    fn name(&self) -> String {
        self.hub_channel.name.clone()
    }

    async fn attach(&self) -> Result<(), TransportError> {
        self.hub.check(FaultPoint::Attach)?;
        self.ensure_connected()?;
        let mut attach_serial = self.attach_serial.lock();
        if attach_serial.is_none() {
            *attach_serial = Some(self.hub_channel.current_serial());
        }
        Ok(())
    }

    fn subscribe(&self, sink: EventSink) -> Subscription {
        let subscription = Subscription::new(SubscriptionKind::Messages);
        self.hub_channel
            .message_subscribers
            .insert(subscription.id, self.subscriber(sink));
        subscription
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.hub_channel.message_subscribers.remove(&subscription.id);
    }

    async fn publish(&self, message: OutgoingMessage) -> Result<(), TransportError> {
        self.hub.check(FaultPoint::Publish)?;
        self.ensure_connected()?;
        self.ensure_attached()?;
        self.hub_channel
            .publish(self.connection_id, &self.client_id, message);
        Ok(())
    }

    async fn history(
        &self,
        params: HistoryParams,
    ) -> Result<PaginatedResult<ChatMessage>, TransportError> {
        self.hub.check(FaultPoint::History)?;
        let until = if params.until_attach {
            Some(self.ensure_attached()?)
        } else {
            None
        };
        let log = self.hub_channel.messages.read();
        Ok(HubChannel::page(&log, params, until))
    }

    async fn presence_enter(&self, data: Option<PresenceData>) -> Result<(), TransportError> {
        self.hub.check(FaultPoint::PresenceEnter)?;
        self.ensure_attached()?;
        self.hub_channel
            .upsert_member(self.connection_id, &self.client_id, data);
        Ok(())
    }

    async fn presence_update(&self, data: PresenceData) -> Result<(), TransportError> {
        self.hub.check(FaultPoint::PresenceUpdate)?;
        self.ensure_attached()?;
        self.hub_channel
            .upsert_member(self.connection_id, &self.client_id, Some(data));
        Ok(())
    }

    fn presence_subscribe(&self, sink: EventSink) -> Subscription {
        let subscription = Subscription::new(SubscriptionKind::Presence);
        self.hub_channel
            .presence_subscribers
            .insert(subscription.id, self.subscriber(sink));
        subscription
    }

    fn presence_unsubscribe(&self, subscription: Subscription) {
        self.hub_channel
            .presence_subscribers
            .remove(&subscription.id);
    }

    async fn presence_get(&self) -> Result<Vec<PresenceMessage>, TransportError> {
        self.hub.check(FaultPoint::PresenceGet)?;
        self.ensure_attached()?;
        let now = Utc::now();
        let members = self.hub_channel.members.read();
        Ok(members
            .iter()
            .map(|(conn, client_id, data)| PresenceMessage {
                id: format!("{}:{}", self.hub_channel.name, conn),
                client_id: client_id.clone(),
                action: PresenceAction::Present,
                data: *data,
                timestamp: now,
            })
            .collect())
    }

    async fn presence_history(
        &self,
        params: HistoryParams,
    ) -> Result<PaginatedResult<PresenceMessage>, TransportError> {
        self.hub.check(FaultPoint::PresenceHistory)?;
        let until = if params.until_attach {
            Some(self.ensure_attached()?)
        } else {
            None
        };
        let log = self.hub_channel.presence_log.read();
        Ok(HubChannel::page(&log, params, until))
    }
}
