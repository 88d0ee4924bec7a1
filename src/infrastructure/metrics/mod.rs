//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - Outbox messages handled, by outcome (processed / retried / failed)
//! - Outbox batch duration
//! - Outbox backlog, by delivery state

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tracing::warn;

use crate::domain::OutboxStats;

const NAMESPACE: &str = "chat_outbox";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Messages handled by the processor, by outcome
pub static OUTBOX_MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("outbox_messages_total", "Outbox messages handled by the processor")
            .namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create OUTBOX_MESSAGES_TOTAL metric")
});

/// Wall time of one non-empty poll cycle, persistence included
pub static OUTBOX_BATCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];
    Histogram::with_opts(
        HistogramOpts::new("outbox_batch_duration_seconds", "Outbox batch latency in seconds")
            .namespace(NAMESPACE)
            .buckets(buckets),
    )
    .expect("Failed to create OUTBOX_BATCH_DURATION_SECONDS metric")
});

/// Rows per delivery state, refreshed when stats are read
pub static OUTBOX_BACKLOG: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("outbox_backlog", "Outbox rows by delivery state").namespace(NAMESPACE),
        &["status"], // "pending", "processed", "failed"
    )
    .expect("Failed to create OUTBOX_BACKLOG metric")
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(OUTBOX_MESSAGES_TOTAL.clone()))
        .expect("Failed to register OUTBOX_MESSAGES_TOTAL");
    registry
        .register(Box::new(OUTBOX_BATCH_DURATION_SECONDS.clone()))
        .expect("Failed to register OUTBOX_BATCH_DURATION_SECONDS");
    registry
        .register(Box::new(OUTBOX_BACKLOG.clone()))
        .expect("Failed to register OUTBOX_BACKLOG");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_outbox_outcome(outcome: &str) {
    OUTBOX_MESSAGES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_outbox_batch(duration_secs: f64) {
    OUTBOX_BATCH_DURATION_SECONDS.observe(duration_secs);
}

pub fn update_outbox_backlog(stats: &OutboxStats) {
    OUTBOX_BACKLOG.with_label_values(&["pending"]).set(stats.pending);
    OUTBOX_BACKLOG.with_label_values(&["processed"]).set(stats.processed);
    OUTBOX_BACKLOG.with_label_values(&["failed"]).set(stats.failed);
}
