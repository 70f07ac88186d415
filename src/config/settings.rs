//! Application settings and configuration structures.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::transport::{HistoryDirection, HistoryParams};

/// Default channel every client joins
pub const DEFAULT_CHANNEL_NAME: &str = "mobile:chat";

/// Default token-request endpoint handed to the transport
pub const DEFAULT_AUTH_URL: &str = "https://localhost/auth/token-request";

/// Upper bound accepted for a history page
pub const MAX_HISTORY_LIMIT: u32 = 1000;

/// Root configuration structure containing all client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Transport configuration (channel, auth)
    pub transport: TransportSettings,

    /// History retrieval parameters
    pub history: HistorySettings,

    /// Typing indicator configuration
    pub typing: TypingSettings,

    /// Retry horizons reported for transient connection states
    pub connection: ConnectionSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Realtime transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    /// Name of the shared chat channel
    pub channel_name: String,

    /// Token-request endpoint for transport authentication
    pub auth_url: String,

    /// Whether the transport echoes our own messages back to us
    pub echo_messages: bool,
}

/// History retrieval configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    /// Page size for message and presence history
    pub limit: u32,

    /// Page order (backwards = newest first)
    pub direction: HistoryDirection,

    /// Only return history published before the channel attached
    pub until_attach: bool,
}

/// Typing indicator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingSettings {
    /// Quiet period after the last keystroke before stop-typing fires
    pub quiet_period_ms: u64,
}

/// Retry horizons the transport applies to transient states.
///
/// Only reported to the user; the retry timers belong to the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Retry horizon while Disconnected in seconds (default: 30)
    pub disconnected_retry_secs: u64,

    /// Retry horizon while Suspended in seconds (default: 60)
    pub suspended_retry_secs: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::defaults(&environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__HISTORY__LIMIT=20 -> history.limit = 20
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("transport.channel_name", std::env::var("CHAT_CHANNEL").ok())?
            .set_override_option("transport.auth_url", std::env::var("CHAT_AUTH_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    fn defaults(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("transport.channel_name", DEFAULT_CHANNEL_NAME)?
            .set_default("transport.auth_url", DEFAULT_AUTH_URL)?
            .set_default("transport.echo_messages", true)?
            .set_default("history.limit", 50_i64)?
            .set_default("history.direction", "backwards")?
            .set_default("history.until_attach", true)?
            .set_default("typing.quiet_period_ms", 5000_i64)?
            .set_default("connection.disconnected_retry_secs", 30_i64)?
            .set_default("connection.suspended_retry_secs", 60_i64)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.transport.channel_name.trim().is_empty() {
            return Err(ConfigError::Message("transport.channel_name must not be empty".into()));
        }
        if self.history.limit == 0 || self.history.limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Message(format!(
                "history.limit must be between 1 and {}. Current value: {}",
                MAX_HISTORY_LIMIT, self.history.limit
            )));
        }
        if self.typing.quiet_period_ms == 0 {
            return Err(ConfigError::Message("typing.quiet_period_ms must be positive".into()));
        }
        Ok(self)
    }

    /// Settings built from defaults only, ignoring files and environment.
    pub fn from_defaults() -> Result<Self, ConfigError> {
        Self::defaults("test")?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// History query derived from the history settings
    pub fn history_params(&self) -> HistoryParams {
        HistoryParams {
            limit: self.history.limit,
            direction: self.history.direction,
            until_attach: self.history.until_attach,
        }
    }
}

impl TypingSettings {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

impl ConnectionSettings {
    pub fn disconnected_retry(&self) -> Duration {
        Duration::from_secs(self.disconnected_retry_secs)
    }

    pub fn suspended_retry(&self) -> Duration {
        Duration::from_secs(self.suspended_retry_secs)
    }
}
