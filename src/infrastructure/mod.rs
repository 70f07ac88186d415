//! Infrastructure Layer
//!
//! Contains implementations for external concerns including:
//! - Transport implementations (in-process hub)
//! - Prometheus metrics

pub mod metrics;
pub mod transport;
