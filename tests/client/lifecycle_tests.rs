//! Connection Lifecycle Tests
//!
//! Leave, resume, transient drops and fatal failure as seen by the client.

use chat_session::domain::entities::ConnectionState;
use chat_session::domain::transport::RealtimeTransport;
use chat_session::infrastructure::transport::{FaultPoint, MemoryHub};
use chat_session::shared::error::{ConnectError, TransportError};
use pretty_assertions::assert_eq;

use crate::common::{wait_until, TestClient, CHANNEL};

#[tokio::test]
async fn test_leave_removes_every_listener() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    assert_eq!(hub.message_subscriber_count(CHANNEL), 1);
    assert_eq!(hub.presence_subscriber_count(CHANNEL), 1);

    alice.client.leave();

    assert_eq!(hub.message_subscriber_count(CHANNEL), 0);
    assert_eq!(hub.presence_subscriber_count(CHANNEL), 0);
    assert!(hub.present_client_ids(CHANNEL).is_empty());
    wait_until("closed", || {
        alice.client.session().state() == Some(ConnectionState::Closed)
    })
    .await;

    // Leaving twice is harmless
    alice.client.leave();
    assert_eq!(alice.transport.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_no_events_after_leave() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    let bob = TestClient::joined(&hub, "bob").await;

    alice.client.leave();
    let before = alice.client.timeline_lines();

    bob.client.send_message("anyone?").await.unwrap();
    wait_until("bob sees own message", || {
        bob.client.timeline_lines().contains(&"bob: anyone?".to_string())
    })
    .await;

    assert_eq!(alice.client.timeline_lines(), before);
}

#[tokio::test]
async fn test_resume_after_leave_reenters_and_reloads_history() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    alice.client.send_message("before leaving").await.unwrap();
    assert_eq!(alice.client.epoch(), 1);

    alice.client.leave();
    wait_until("closed", || {
        alice.client.session().state() == Some(ConnectionState::Closed)
    })
    .await;

    alice.client.resume();
    wait_until("re-entered", || alice.client.epoch() == 2).await;
    wait_until("history reloaded", || {
        alice
            .client
            .timeline_lines()
            .contains(&"alice: before leaving".to_string())
    })
    .await;

    assert_eq!(hub.message_subscriber_count(CHANNEL), 1);
    assert_eq!(hub.present_client_ids(CHANNEL), vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_resume_immediately_after_leave_reenters() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;

    alice.client.leave();
    alice.client.resume();

    wait_until("re-entered", || alice.client.epoch() == 2).await;
    wait_until("connected", || {
        alice.client.session().state() == Some(ConnectionState::Connected)
    })
    .await;
    assert_eq!(hub.message_subscriber_count(CHANNEL), 1);
    assert_eq!(hub.present_client_ids(CHANNEL), vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_message_in_flight_at_leave_is_not_shown() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    let bob = TestClient::joined(&hub, "bob").await;
    wait_until("alice sees bob", || {
        alice
            .client
            .timeline_lines()
            .contains(&"bob has entered the chat".to_string())
    })
    .await;

    bob.client.send_message("racing").await.unwrap();
    alice.client.leave();
    let at_leave = alice.client.timeline_lines();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(alice.client.timeline_lines(), at_leave);
    assert!(!at_leave.contains(&"bob: racing".to_string()));
}

#[tokio::test]
async fn test_disconnect_reports_retry_and_keeps_listeners() {
    let hub = MemoryHub::new();
    let mut alice = TestClient::joined(&hub, "alice").await;

    alice.transport.force_state(ConnectionState::Disconnected, None);
    let notice = alice.next_notice().await;
    assert!(!notice.is_fatal());
    assert!(notice
        .message()
        .contains("We will retry connecting again in 15 seconds"));

    alice.client.resume();
    wait_until("connected", || {
        alice.client.session().state() == Some(ConnectionState::Connected)
    })
    .await;

    // Still the first entry; listeners survived the drop
    assert_eq!(alice.client.epoch(), 1);
    alice.client.send_message("back").await.unwrap();
    wait_until("delivered", || {
        alice.client.timeline_lines().contains(&"alice: back".to_string())
    })
    .await;
}

#[tokio::test]
async fn test_failure_is_fatal_and_final() {
    let hub = MemoryHub::new();
    let mut alice = TestClient::joined(&hub, "alice").await;

    alice.transport.force_state(
        ConnectionState::Failed,
        Some(TransportError::new(80019, 401, "token expired")),
    );
    let notice = alice.next_notice().await;
    assert!(notice.is_fatal());
    assert_eq!(
        notice.message(),
        "We're sorry, the connection failed. Please restart the app."
    );

    alice.client.resume();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(alice.client.session().state(), Some(ConnectionState::Failed));
    assert!(!alice.client.session().is_entered());
    assert_eq!(hub.message_subscriber_count(CHANNEL), 0);
}

#[tokio::test]
async fn test_attach_failure_is_reported() {
    let hub = MemoryHub::new();
    hub.inject_fault(FaultPoint::Attach);
    let mut alice = TestClient::new(&hub);

    alice.client.join("alice").unwrap();
    let notice = alice.next_notice().await;

    assert!(!notice.is_fatal());
    assert!(notice.message().contains("Unable to attach channel mobile:chat"));
    assert!(!alice.client.session().is_entered());
}

#[tokio::test]
async fn test_second_join_is_rejected_while_active() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;

    let result = alice.client.join("alice-again");
    assert_eq!(result, Err(ConnectError::AlreadyActive("alice".into())));
}
