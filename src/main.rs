//! # Chat Session Demo
//!
//! Runs a short conversation between two clients over the in-process
//! transport.
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Two chat clients sharing one hub

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use chat_session::config::Settings;
use chat_session::infrastructure::metrics;
use chat_session::infrastructure::transport::{MemoryHub, MemoryTransport};
use chat_session::startup::{ChatClient, NoticeStream};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = Settings::load().context("failed to load settings")?;

    if settings.environment == "production" {
        chat_session::telemetry::init_json_tracing();
    } else {
        chat_session::telemetry::init_tracing();
    }
    info!(
        channel = %settings.transport.channel_name,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let hub = MemoryHub::new();
    let (alice, alice_notices) =
        ChatClient::build(&settings, Arc::new(MemoryTransport::new(hub.clone())));
    let (bob, bob_notices) =
        ChatClient::build(&settings, Arc::new(MemoryTransport::new(hub.clone())));
    spawn_notice_logger("alice", alice_notices);
    spawn_notice_logger("bob", bob_notices);

    alice.join("alice")?;
    settle().await;
    alice.send_message("Hello, is anyone here?").await?;

    bob.join("bob")?;
    settle().await;
    bob.on_text_changed();
    settle().await;
    info!(label = %alice.typing_label(), "Alice sees");

    bob.send_message("Hi alice!").await?;
    settle().await;

    for line in bob.timeline_lines() {
        info!(%line, "Bob's timeline");
    }
    info!(present = alice.present_count(), mentions = ?alice.mention_candidates(), "Alice's badge");

    bob.shutdown();
    settle().await;
    for line in alice.timeline_lines() {
        info!(%line, "Alice's timeline");
    }
    alice.shutdown();

    info!(metrics = %metrics::gather_metrics(), "Session metrics");
    Ok(())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn spawn_notice_logger(who: &'static str, mut notices: NoticeStream) {
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            tracing::warn!(client = who, fatal = notice.is_fatal(), "{}", notice.message());
        }
    });
}
