//! Session Manager Tests
//!
//! The session manager and history loader driven against the in-process
//! transport, without a chat client on top.

use std::sync::Arc;

use chat_session::application::services::{HistoryLoader, SessionManager};
use chat_session::domain::entities::{ChatEvent, ConnectionState, PresenceAction};
use chat_session::domain::transport::HistoryParams;
use chat_session::infrastructure::transport::{MemoryHub, MemoryTransport};
use chat_session::shared::error::{ChatError, SendError};
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use crate::common::{test_settings, wait_until};

struct Connected {
    manager: SessionManager,
    outcomes: mpsc::UnboundedReceiver<Result<(), ChatError>>,
}

async fn connected(hub: &Arc<MemoryHub>, client_id: &str) -> Connected {
    let manager = SessionManager::new(Arc::new(MemoryTransport::new(hub.clone())), &test_settings());
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    assert_ok!(manager.connect(client_id, move |result| {
        let _ = tx.send(result);
    }));
    assert_ok!(outcomes.recv().await.expect("connection outcome"));
    Connected { manager, outcomes }
}

#[tokio::test]
async fn test_connected_callback_fires_after_attach() {
    let hub = MemoryHub::new();
    let mut alice = connected(&hub, "alice").await;

    assert!(alice.manager.attached_channel().is_some());
    assert!(!alice.manager.is_entered());
    assert!(alice.outcomes.try_recv().is_err());
}

#[tokio::test]
async fn test_enter_chat_publishes_presence_and_streams_events() {
    let hub = MemoryHub::new();
    let alice = connected(&hub, "alice").await;
    let mut events = assert_ok!(alice.manager.enter_chat().await);

    match events.recv().await {
        Some(ChatEvent::Presence(p)) => {
            assert_eq!(p.action, PresenceAction::Enter);
            assert_eq!(p.client_id, "alice");
        }
        other => panic!("expected own enter, got {:?}", other),
    }

    assert_ok!(alice.manager.send_message("hi").await);
    match events.recv().await {
        Some(ChatEvent::Message(m)) => assert_eq!(m.sender(), "alice"),
        other => panic!("expected message, got {:?}", other),
    }

    let present = alice.manager.get_present_users().await;
    assert_eq!(present.len(), 1);
    assert_eq!(present[0].client_id, "alice");
}

#[tokio::test]
async fn test_disconnect_ends_the_event_stream() {
    let hub = MemoryHub::new();
    let alice = connected(&hub, "alice").await;
    let mut events = assert_ok!(alice.manager.enter_chat().await);
    let _own_enter = events.recv().await;

    alice.manager.disconnect();
    assert_eq!(events.recv().await, None);
    assert!(!alice.manager.is_entered());
}

#[tokio::test]
async fn test_send_before_connect_fails() {
    let hub = MemoryHub::new();
    let manager = SessionManager::new(Arc::new(MemoryTransport::new(hub)), &test_settings());

    let err = assert_err!(manager.send_message("hello").await);
    assert_eq!(err, SendError::NotConnected);
}

#[tokio::test]
async fn test_stop_typing_while_closed_is_skipped() {
    let hub = MemoryHub::new();
    let alice = connected(&hub, "alice").await;
    alice.manager.disconnect();
    wait_until("closed", || alice.manager.state() == Some(ConnectionState::Closed)).await;

    assert_ok!(alice.manager.notify_typing(false).await);
    assert_err!(alice.manager.notify_typing(true).await);
}

#[tokio::test]
async fn test_presence_history_has_no_updates() {
    let hub = MemoryHub::new();
    let bob = connected(&hub, "bob").await;
    let _bob_events = assert_ok!(bob.manager.enter_chat().await);
    assert_ok!(bob.manager.notify_typing(true).await);
    assert_ok!(bob.manager.notify_typing(false).await);

    let carol = connected(&hub, "carol").await;
    let channel = carol.manager.attached_channel().expect("attached");
    let snapshot = HistoryLoader::new(HistoryParams::default()).load(channel.as_ref()).await;

    assert!(snapshot.errors.is_empty());
    assert_eq!(snapshot.presence.len(), 1);
    assert!(snapshot
        .presence
        .iter()
        .all(|p| p.action != PresenceAction::Update));
}
