//! Chat Flow Tests
//!
//! Two or more clients talking over one in-process hub.

use chat_session::infrastructure::transport::MemoryHub;
use chat_session::shared::error::SendError;
use pretty_assertions::assert_eq;

use crate::common::{test_settings, wait_until, TestClient};

#[tokio::test]
async fn test_join_tracks_presence_on_both_sides() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    wait_until("alice sees herself", || alice.client.present_count() == 1).await;

    let bob = TestClient::joined(&hub, "bob").await;
    wait_until("both see two users", || {
        alice.client.present_count() == 2 && bob.client.present_count() == 2
    })
    .await;

    assert!(alice
        .client
        .timeline_lines()
        .contains(&"bob has entered the chat".to_string()));
    assert_eq!(
        bob.client.mention_candidates(),
        vec!["@alice".to_string(), "@bob (me)".to_string()]
    );
}

#[tokio::test]
async fn test_messages_reach_every_timeline() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    let bob = TestClient::joined(&hub, "bob").await;

    alice.client.send_message("hello").await.unwrap();

    let line = "alice: hello".to_string();
    wait_until("message delivered", || {
        alice.client.timeline_lines().contains(&line) && bob.client.timeline_lines().contains(&line)
    })
    .await;
}

#[tokio::test]
async fn test_typing_label_follows_remote_typing() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    let bob = TestClient::joined(&hub, "bob").await;

    bob.client.on_text_changed();
    wait_until("alice sees bob typing", || alice.client.typing_label() == "bob is typing").await;
    assert_eq!(bob.client.typing_label(), "");

    // Quiet period is 200ms in tests
    wait_until("typing stops", || alice.client.typing_label().is_empty()).await;
}

#[tokio::test]
async fn test_history_is_loaded_on_entry_in_chronological_order() {
    let hub = MemoryHub::new();
    let alice = TestClient::joined(&hub, "alice").await;
    for text in ["one", "two", "three"] {
        alice.client.send_message(text).await.unwrap();
    }

    let bob = TestClient::joined(&hub, "bob").await;
    let from_alice = || -> Vec<String> {
        bob.client
            .timeline_lines()
            .into_iter()
            .filter(|line| line.starts_with("alice: "))
            .collect()
    };
    wait_until("history merged", || from_alice().len() == 3).await;

    assert_eq!(
        from_alice(),
        vec![
            "alice: one".to_string(),
            "alice: two".to_string(),
            "alice: three".to_string(),
        ]
    );
    wait_until("presence history merged", || {
        bob.client
            .timeline_lines()
            .contains(&"alice has entered the chat".to_string())
    })
    .await;
}

#[tokio::test]
async fn test_blank_message_is_rejected_with_notice() {
    let hub = MemoryHub::new();
    let mut alice = TestClient::joined(&hub, "alice").await;

    let result = alice.client.send_message("   ").await;
    assert!(matches!(result, Err(SendError::InvalidMessage(_))));

    let notice = alice.next_notice().await;
    assert!(!notice.is_fatal());
    assert!(alice
        .client
        .timeline_lines()
        .iter()
        .all(|line| !line.starts_with("alice: ")));
}

#[tokio::test]
async fn test_five_typists_collapse_to_other() {
    let hub = MemoryHub::new();
    let observer = TestClient::joined(&hub, "zed").await;

    let mut settings = test_settings();
    settings.typing.quiet_period_ms = 5_000;
    let mut typists = Vec::new();
    for name in ["ann", "ben", "cid", "dee", "eve"] {
        typists.push(TestClient::joined_with(&hub, name, &settings).await);
    }

    // One at a time, so arrival order is fixed
    for (seen, typist) in typists.iter().enumerate() {
        typist.client.on_text_changed();
        wait_until("typing observed", || {
            typing_count(&observer) == seen + 1
        })
        .await;
    }

    assert_eq!(observer.client.typing_label(), "ann, ben, cid and other are typing");
}

fn typing_count(observer: &TestClient) -> usize {
    let label = observer.client.typing_label();
    match label.as_str() {
        "" => 0,
        l if l.ends_with("and other are typing") => 5,
        l => l.matches(", ").count() + l.matches(" and ").count() + 1,
    }
}
