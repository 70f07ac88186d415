//! Session Manager
//!
//! Owns the single active chat session: connection lifecycle, channel attach,
//! subscriptions, publishing and presence updates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::typing_debouncer::TypingNotifier;
use crate::config::Settings;
use crate::domain::entities::{
    ChatEvent, ConnectionState, ConnectionStateChange, OutgoingMessage, PresenceData, PresentUser,
    Session,
};
use crate::domain::transport::{ClientOptions, RealtimeChannel, RealtimeTransport, Subscription, SubscriptionKind};
use crate::infrastructure::metrics;
use crate::shared::error::{ChatError, ConnectError, FatalConnectionError, SendError};
use crate::shared::validation::{validate_client_id, validate_message_text};

/// Callback invoked for every reported connection transition
pub type ConnectionCallback = Arc<dyn Fn(Result<(), ChatError>) + Send + Sync>;

/// Stream of live chat events for an entered session
pub type EventStream = mpsc::UnboundedReceiver<ChatEvent>;

#[derive(Default)]
struct SessionInner {
    session: Option<Session>,
    channel: Option<Arc<dyn RealtimeChannel>>,
    subscriptions: Vec<Subscription>,
    watcher: Option<JoinHandle<()>>,
}

impl SessionInner {
    /// Detach listeners from the channel. Returns how many were removed.
    fn teardown(&mut self) -> usize {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        if let Some(channel) = &self.channel {
            for subscription in &subscriptions {
                match subscription.kind {
                    SubscriptionKind::Messages => channel.unsubscribe(*subscription),
                    SubscriptionKind::Presence => channel.presence_unsubscribe(*subscription),
                }
            }
        }
        subscriptions.len()
    }
}

/// Connection context the state watcher needs
#[derive(Clone)]
struct WatchContext {
    inner: Arc<Mutex<SessionInner>>,
    transport: Arc<dyn RealtimeTransport>,
    channel_name: String,
    disconnected_retry: Duration,
    suspended_retry: Duration,
    callback: ConnectionCallback,
}

/// Manages the one chat session of this client.
pub struct SessionManager {
    transport: Arc<dyn RealtimeTransport>,
    channel_name: String,
    auth_url: String,
    echo_messages: bool,
    disconnected_retry: Duration,
    suspended_retry: Duration,
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn RealtimeTransport>, settings: &Settings) -> Self {
        Self {
            transport,
            channel_name: settings.transport.channel_name.clone(),
            auth_url: settings.transport.auth_url.clone(),
            echo_messages: settings.transport.echo_messages,
            disconnected_retry: settings.connection.disconnected_retry(),
            suspended_retry: settings.connection.suspended_retry(),
            inner: Arc::new(Mutex::new(SessionInner::default())),
        }
    }

    /// Begin a connection attempt for `client_id`.
    ///
    /// `callback` is invoked once per Connected (after the channel attached),
    /// Disconnected, Suspended and Failed transition.
    ///
    /// # Errors
    ///
    /// Fails on an empty client id, when a session is already active, or
    /// when the transport refuses to open a connection.
    pub fn connect<F>(&self, client_id: &str, callback: F) -> Result<(), ConnectError>
    where
        F: Fn(Result<(), ChatError>) + Send + Sync + 'static,
    {
        validate_client_id(client_id)?;

        let mut inner = self.inner.lock();
        if let Some(session) = inner.session.as_ref().filter(|s| s.is_active()) {
            return Err(ConnectError::AlreadyActive(session.client_id.clone()));
        }

        let options = ClientOptions {
            client_id: client_id.to_string(),
            auth_url: self.auth_url.clone(),
            echo_messages: self.echo_messages,
        };
        let changes = self.transport.connect(&options).map_err(ConnectError::Transport)?;

        if let Some(watcher) = inner.watcher.take() {
            watcher.abort();
        }
        inner.subscriptions.clear();
        inner.channel = None;

        let session = Session::new(client_id, &self.channel_name);
        tracing::info!(
            session_id = %session.session_id,
            client_id = %client_id,
            channel = %self.channel_name,
            "Connecting"
        );
        inner.session = Some(session);

        let ctx = WatchContext {
            inner: self.inner.clone(),
            transport: self.transport.clone(),
            channel_name: self.channel_name.clone(),
            disconnected_retry: self.disconnected_retry,
            suspended_retry: self.suspended_retry,
            callback: Arc::new(callback),
        };
        inner.watcher = Some(tokio::spawn(async move {
            let mut changes = changes;
            while let Some(change) = changes.recv().await {
                handle_state_change(&ctx, change).await;
            }
            tracing::debug!("Connection state stream ended");
        }));

        Ok(())
    }

    /// Subscribe message and presence listeners, then enter presence.
    ///
    /// Earlier subscriptions of this session are replaced.
    pub async fn enter_chat(&self) -> Result<EventStream, ConnectError> {
        let channel = self.attached_channel().ok_or(ConnectError::NotConnected)?;

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock();
            inner.teardown();
            let messages = channel.subscribe(tx.clone());
            let presence = channel.presence_subscribe(tx);
            inner.subscriptions = vec![messages, presence];
        }

        channel.presence_enter(None).await.map_err(|e| {
            tracing::error!(error = %e, "Unable to enter presence");
            ConnectError::Enter(e)
        })?;

        tracing::info!(channel = %channel.name(), "Entered chat");
        Ok(rx)
    }

    /// Publish a chat message under our client id.
    ///
    /// Blank text is rejected locally without a round trip.
    pub async fn send_message(&self, text: &str) -> Result<(), SendError> {
        if let Err(e) = validate_message_text(text) {
            metrics::record_message_sent("invalid");
            return Err(e);
        }

        let (channel, client_id) = self.channel_and_client().ok_or(SendError::NotConnected)?;
        let message = OutgoingMessage {
            name: client_id,
            text: text.to_string(),
        };

        match channel.publish(message).await {
            Ok(()) => {
                metrics::record_message_sent("ok");
                tracing::debug!("Message sent");
                Ok(())
            }
            Err(e) => {
                metrics::record_message_sent("rejected");
                tracing::warn!(error = %e, "Message rejected");
                Err(SendError::Rejected(e))
            }
        }
    }

    /// Publish our typing state as a presence update.
    ///
    /// A stop notification while not connected is skipped.
    pub async fn notify_typing(&self, is_typing: bool) -> Result<(), SendError> {
        if !is_typing && self.state() != Some(ConnectionState::Connected) {
            return Ok(());
        }

        let channel = self.attached_channel().ok_or(SendError::NotConnected)?;
        let result = channel
            .presence_update(PresenceData::typing(is_typing))
            .await
            .map_err(SendError::Rejected);

        metrics::record_typing_notification(is_typing, result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(error = %e, is_typing, "Typing notification failed");
        }
        result
    }

    /// Snapshot of the users present on the channel.
    ///
    /// Empty when the channel is not attached yet or the snapshot fails.
    pub async fn get_present_users(&self) -> Vec<PresentUser> {
        let Some(channel) = self.attached_channel() else {
            tracing::warn!("Presence requested before the channel attached");
            return Vec::new();
        };

        match channel.presence_get().await {
            Ok(members) => {
                let mut users: Vec<PresentUser> = Vec::with_capacity(members.len());
                for member in &members {
                    let user = PresentUser::from(member);
                    if !users.contains(&user) {
                        users.push(user);
                    }
                }
                users
            }
            Err(e) => {
                tracing::error!(error = %e, "Presence snapshot failed");
                Vec::new()
            }
        }
    }

    /// Tear down subscriptions and close the connection. Idempotent.
    pub fn disconnect(&self) {
        {
            let mut inner = self.inner.lock();
            match inner.session.as_ref().map(|s| s.state) {
                None
                | Some(ConnectionState::Closing)
                | Some(ConnectionState::Closed)
                | Some(ConnectionState::Failed) => return,
                Some(_) => {}
            }
            let removed = inner.teardown();
            inner.channel = None;
            if let Some(session) = inner.session.as_mut() {
                session.state = ConnectionState::Closing;
            }
            tracing::info!(removed, "Disconnecting");
        }
        self.transport.close();
    }

    /// Re-open the connection of the previous session. Idempotent; no-op
    /// without a prior session, while connecting/connected, or after a
    /// fatal failure.
    pub fn reconnect(&self) {
        let state = match self.state() {
            Some(state) => state,
            None => {
                tracing::debug!("Reconnect requested without a session");
                return;
            }
        };

        match state {
            ConnectionState::Failed => {
                tracing::warn!("Reconnect requested after fatal failure; ignoring");
            }
            ConnectionState::Initialized
            | ConnectionState::Connecting
            | ConnectionState::Connected => {}
            _ => {
                tracing::info!(%state, retrying = state.is_transient(), "Reconnecting");
                self.transport.reconnect();
            }
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    pub fn state(&self) -> Option<ConnectionState> {
        self.inner.lock().session.as_ref().map(|s| s.state)
    }

    pub fn client_id(&self) -> Option<String> {
        self.inner.lock().session.as_ref().map(|s| s.client_id.clone())
    }

    /// Whether live listeners are registered
    pub fn is_entered(&self) -> bool {
        !self.inner.lock().subscriptions.is_empty()
    }

    pub fn attached_channel(&self) -> Option<Arc<dyn RealtimeChannel>> {
        self.inner.lock().channel.clone()
    }

    fn channel_and_client(&self) -> Option<(Arc<dyn RealtimeChannel>, String)> {
        let inner = self.inner.lock();
        let channel = inner.channel.clone()?;
        let client_id = inner.session.as_ref()?.client_id.clone();
        Some((channel, client_id))
    }
}

#[async_trait]
impl TypingNotifier for SessionManager {
    async fn notify_typing(&self, is_typing: bool) -> Result<(), SendError> {
        SessionManager::notify_typing(self, is_typing).await
    }
}

async fn handle_state_change(ctx: &WatchContext, change: ConnectionStateChange) {
    {
        let mut inner = ctx.inner.lock();
        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if !session.apply(&change) {
            tracing::warn!(
                previous = %change.previous,
                current = %change.current,
                "Unexpected connection transition"
            );
        }
    }
    metrics::record_connection_state(change.current.as_str());

    match change.current {
        ConnectionState::Initialized | ConnectionState::Connecting | ConnectionState::Closed => {
            tracing::debug!(state = %change.current, "Connection state");
        }
        ConnectionState::Connected => {
            let channel = ctx.transport.channel(&ctx.channel_name);
            match channel.attach().await {
                Ok(()) => {
                    {
                        let mut inner = ctx.inner.lock();
                        if !inner.session.as_ref().is_some_and(|s| s.is_connected()) {
                            tracing::debug!(channel = %ctx.channel_name, "Session moved on during attach");
                            return;
                        }
                        inner.channel = Some(channel);
                    }
                    tracing::info!(channel = %ctx.channel_name, "Connected and attached");
                    (ctx.callback)(Ok(()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Something went wrong attaching channel");
                    (ctx.callback)(Err(ConnectError::Attach {
                        channel: ctx.channel_name.clone(),
                        source: e,
                    }
                    .into()));
                }
            }
        }
        ConnectionState::Disconnected => {
            let retry_in = change.retry_in.unwrap_or(ctx.disconnected_retry);
            tracing::warn!(retry_in_secs = retry_in.as_secs(), "Connection disconnected");
            (ctx.callback)(Err(ConnectError::Disconnected { retry_in }.into()));
        }
        ConnectionState::Suspended => {
            let retry_in = change.retry_in.unwrap_or(ctx.suspended_retry);
            tracing::warn!(retry_in_secs = retry_in.as_secs(), "Connection suspended");
            (ctx.callback)(Err(ConnectError::Suspended { retry_in }.into()));
        }
        ConnectionState::Closing => {
            let mut inner = ctx.inner.lock();
            let removed = inner.teardown();
            inner.channel = None;
            tracing::debug!(removed, "Closing; subscriptions removed");
        }
        ConnectionState::Failed => {
            {
                let mut inner = ctx.inner.lock();
                inner.teardown();
                inner.channel = None;
            }
            tracing::error!(reason = ?change.reason, "Connection failed");
            (ctx.callback)(Err(FatalConnectionError {
                reason: change.reason,
            }
            .into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transport::{MockRealtimeChannel, MockRealtimeTransport};
    use crate::shared::error::TransportError;

    fn settings() -> Settings {
        Settings::from_defaults().unwrap()
    }

    #[tokio::test]
    async fn test_blank_message_never_reaches_transport() {
        // No expectations: any transport call panics.
        let transport = MockRealtimeTransport::new();
        let manager = SessionManager::new(Arc::new(transport), &settings());

        assert_eq!(
            manager.send_message("   ").await,
            Err(SendError::InvalidMessage("text: must not be blank".into()))
        );
        assert!(matches!(
            manager.send_message("").await,
            Err(SendError::InvalidMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_client_id() {
        let transport = MockRealtimeTransport::new();
        let manager = SessionManager::new(Arc::new(transport), &settings());

        let result = manager.connect("", |_| {});
        assert!(matches!(result, Err(ConnectError::InvalidClientId(_))));
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn test_connect_surfaces_transport_refusal() {
        let mut transport = MockRealtimeTransport::new();
        transport
            .expect_connect()
            .times(1)
            .returning(|_| Err(TransportError::new(40100, 401, "token rejected")));
        let manager = SessionManager::new(Arc::new(transport), &settings());

        let result = manager.connect("alice", |_| {});
        assert!(matches!(result, Err(ConnectError::Transport(e)) if e.code == 40100));
    }

    #[tokio::test]
    async fn test_reconnect_without_session_is_noop() {
        let mut transport = MockRealtimeTransport::new();
        transport.expect_reconnect().never();
        transport.expect_close().never();
        let manager = SessionManager::new(Arc::new(transport), &settings());

        manager.reconnect();
        manager.disconnect();
        assert!(manager.state().is_none());
    }

    #[tokio::test]
    async fn test_publish_rejection_is_send_error() {
        let mut channel = MockRealtimeChannel::new();
        channel
            .expect_publish()
            .times(1)
            .returning(|_| Err(TransportError::new(40160, 401, "not permitted")));
        let channel: Arc<dyn RealtimeChannel> = Arc::new(channel);

        let manager = SessionManager::new(Arc::new(MockRealtimeTransport::new()), &settings());
        {
            let mut inner = manager.inner.lock();
            inner.session = Some(Session::new("alice", "mobile:chat"));
            inner.channel = Some(channel);
        }

        let result = manager.send_message("hello").await;
        assert!(matches!(result, Err(SendError::Rejected(e)) if e.code == 40160));
    }

    #[tokio::test]
    async fn test_reconnect_right_after_disconnect_reopens() {
        let mut transport = MockRealtimeTransport::new();
        transport.expect_close().times(1).return_const(());
        transport.expect_reconnect().times(1).return_const(());
        let manager = SessionManager::new(Arc::new(transport), &settings());
        {
            let mut session = Session::new("alice", "mobile:chat");
            session.state = ConnectionState::Connected;
            manager.inner.lock().session = Some(session);
        }

        manager.disconnect();
        assert_eq!(manager.state(), Some(ConnectionState::Closing));
        manager.reconnect();
        // Second disconnect is a no-op
        manager.disconnect();
    }

    #[tokio::test]
    async fn test_attach_completing_after_disconnect_is_dropped() {
        let inner = Arc::new(Mutex::new(SessionInner::default()));
        inner.lock().session = Some(Session::new("alice", "mobile:chat"));

        let during_attach = inner.clone();
        let mut channel = MockRealtimeChannel::new();
        channel.expect_attach().times(1).returning(move || {
            if let Some(session) = during_attach.lock().session.as_mut() {
                session.state = ConnectionState::Closing;
            }
            Ok(())
        });
        let channel: Arc<dyn RealtimeChannel> = Arc::new(channel);
        let mut transport = MockRealtimeTransport::new();
        transport
            .expect_channel()
            .returning(move |_| channel.clone());

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let recorded = outcomes.clone();
        let ctx = WatchContext {
            inner: inner.clone(),
            transport: Arc::new(transport),
            channel_name: "mobile:chat".into(),
            disconnected_retry: Duration::from_secs(30),
            suspended_retry: Duration::from_secs(60),
            callback: Arc::new(move |result: Result<(), ChatError>| recorded.lock().push(result)),
        };

        handle_state_change(
            &ctx,
            ConnectionStateChange::new(ConnectionState::Connecting, ConnectionState::Connected),
        )
        .await;

        assert!(inner.lock().channel.is_none());
        assert!(outcomes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_present_users_empty_before_attach() {
        let manager = SessionManager::new(Arc::new(MockRealtimeTransport::new()), &settings());
        assert!(manager.get_present_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_present_users_empty_when_snapshot_fails() {
        let mut channel = MockRealtimeChannel::new();
        channel
            .expect_presence_get()
            .times(1)
            .returning(|| Err(TransportError::new(91004, 500, "sync failed")));

        let manager = SessionManager::new(Arc::new(MockRealtimeTransport::new()), &settings());
        manager.inner.lock().channel = Some(Arc::new(channel));

        assert!(manager.get_present_users().await.is_empty());
    }
}
