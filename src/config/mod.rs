//! # Configuration Module
//!
//! This module handles client configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_session::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Joining {}", settings.transport.channel_name);
//! ```

mod settings;

pub use settings::*;
