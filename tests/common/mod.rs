//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;
use std::time::Duration;

use chat_session::config::Settings;
use chat_session::infrastructure::transport::{MemoryHub, MemoryTransport};
use chat_session::shared::error::Notice;
use chat_session::startup::{ChatClient, NoticeStream};

/// Channel every test client joins
pub const CHANNEL: &str = "mobile:chat";

/// Default settings with a short typing quiet period
pub fn test_settings() -> Settings {
    let mut settings = Settings::from_defaults().expect("default settings are valid");
    settings.typing.quiet_period_ms = 200;
    settings
}

/// A chat client plus the handles tests poke at
pub struct TestClient {
    pub client: ChatClient,
    pub notices: NoticeStream,
    pub transport: Arc<MemoryTransport>,
}

impl TestClient {
    pub fn new(hub: &Arc<MemoryHub>) -> Self {
        Self::with_settings(hub, &test_settings())
    }

    pub fn with_settings(hub: &Arc<MemoryHub>, settings: &Settings) -> Self {
        let transport = Arc::new(MemoryTransport::new(hub.clone()));
        let (client, notices) = ChatClient::build(settings, transport.clone());
        Self {
            client,
            notices,
            transport,
        }
    }

    /// Join and wait until the chat view has been set up
    pub async fn joined(hub: &Arc<MemoryHub>, client_id: &str) -> Self {
        Self::joined_with(hub, client_id, &test_settings()).await
    }

    pub async fn joined_with(hub: &Arc<MemoryHub>, client_id: &str, settings: &Settings) -> Self {
        let test_client = Self::with_settings(hub, settings);
        test_client.client.join(client_id).expect("join accepted");
        wait_until("chat entered", || test_client.client.epoch() > 0).await;
        test_client
    }

    /// Next notice, failing the test after two seconds
    pub async fn next_notice(&mut self) -> Notice {
        tokio::time::timeout(Duration::from_secs(2), self.notices.recv())
            .await
            .expect("a notice within two seconds")
            .expect("notice stream open")
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
