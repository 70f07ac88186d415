//! Prometheus Metrics Module
//!
//! Provides client-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Connection state transitions by state
//! - Published messages by outcome
//! - Presence events by action
//! - Typing notifications by direction and outcome
//! - History load latency histograms

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Connection state transitions reported by the transport
pub static CONNECTION_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "connection_transitions_total",
            "Connection state transitions reported by the transport",
        )
        .namespace("chat_session"),
        &["state"],
    )
    .expect("Failed to create CONNECTION_TRANSITIONS_TOTAL metric")
});

/// Published messages by outcome
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_sent_total", "Chat messages published").namespace("chat_session"),
        &["outcome"], // "ok", "rejected", "invalid"
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

/// Presence events consumed by the tracker
pub static PRESENCE_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("presence_events_total", "Presence events received").namespace("chat_session"),
        &["action"],
    )
    .expect("Failed to create PRESENCE_EVENTS_TOTAL metric")
});

/// Typing notifications sent
pub static TYPING_NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("typing_notifications_total", "Typing state notifications sent")
            .namespace("chat_session"),
        &["state", "outcome"], // state: "start" | "stop"
    )
    .expect("Failed to create TYPING_NOTIFICATIONS_TOTAL metric")
});

/// History load duration histogram
pub static HISTORY_LOAD_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    HistogramVec::new(
        HistogramOpts::new(
            "history_load_duration_seconds",
            "History retrieval latency in seconds",
        )
        .namespace("chat_session")
        .buckets(buckets),
        &["kind", "outcome"], // kind: "messages" | "presence"
    )
    .expect("Failed to create HISTORY_LOAD_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTION_TRANSITIONS_TOTAL.clone()))
        .expect("Failed to register CONNECTION_TRANSITIONS_TOTAL");
    registry
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SENT_TOTAL");
    registry
        .register(Box::new(PRESENCE_EVENTS_TOTAL.clone()))
        .expect("Failed to register PRESENCE_EVENTS_TOTAL");
    registry
        .register(Box::new(TYPING_NOTIFICATIONS_TOTAL.clone()))
        .expect("Failed to register TYPING_NOTIFICATIONS_TOTAL");
    registry
        .register(Box::new(HISTORY_LOAD_DURATION_SECONDS.clone()))
        .expect("Failed to register HISTORY_LOAD_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Helper to record a connection state transition
pub fn record_connection_state(state: &str) {
    CONNECTION_TRANSITIONS_TOTAL.with_label_values(&[state]).inc();
}

/// Helper to record a publish attempt
pub fn record_message_sent(result: &str) {
    MESSAGES_SENT_TOTAL.with_label_values(&[result]).inc();
}

/// Helper to record a presence event
pub fn record_presence_event(action: &str) {
    PRESENCE_EVENTS_TOTAL.with_label_values(&[action]).inc();
}

/// Helper to record a typing notification
pub fn record_typing_notification(is_typing: bool, ok: bool) {
    let state = if is_typing { "start" } else { "stop" };
    TYPING_NOTIFICATIONS_TOTAL
        .with_label_values(&[state, outcome(ok)])
        .inc();
}

/// Helper to record a history load
pub fn record_history_load(kind: &str, ok: bool, duration_secs: f64) {
    HISTORY_LOAD_DURATION_SECONDS
        .with_label_values(&[kind, outcome(ok)])
        .observe(duration_secs);
}
