//! # Chat Session Library
//!
//! This crate provides the client side of a realtime group chat:
//! - Connection lifecycle with attach, retry notices and fatal failure
//! - Live messages and presence on one shared channel
//! - Debounced typing indicators and a "who is typing" label
//! - Bounded message and presence history on entry
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Chat entities and the realtime transport traits
//! - **Application Layer**: Session services and chat view state
//! - **Infrastructure Layer**: In-process transport and metrics
//!
//! ## Module Structure
//!
//! ```text
//! chat_session/
//! +-- config/         Configuration management
//! +-- domain/         Entities and transport traits
//! +-- application/    Session services and view state
//! +-- infrastructure/ In-process transport, metrics
//! +-- shared/         Errors and validation
//! +-- startup/        Chat client controller
//! ```

// Configuration module
pub mod config;

// Domain layer - Entities and transport contracts
pub mod domain;

// Application layer - Session services
pub mod application;

// Infrastructure layer - Transport implementations and metrics
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Chat client controller
pub mod startup;

// Telemetry and observability
pub mod telemetry;
