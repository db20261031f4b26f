//! Metrics and monitoring using Prometheus.
//!
//! Counters are labelled by owning account and queue name:
//!
//! - **Counters**: messages sent, received, deleted, redriven to a dead-letter
//!   queue, expired by retention and purged
//! - **Histograms**: send and receive latency
//! - **Gauges**: number of live queues
//!
//! [`gather`] renders the registry in Prometheus text format for whatever
//! surface the embedding application exposes.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tracing::error;

/// Global metrics registry
static METRICS_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Global metrics instance, absent if registration failed.
static METRICS: Lazy<Option<Arc<Metrics>>> = Lazy::new(|| {
    match Metrics::new().and_then(|metrics| {
        metrics.register(&METRICS_REGISTRY)?;
        Ok(metrics)
    }) {
        Ok(metrics) => Some(Arc::new(metrics)),
        Err(e) => {
            error!(error = %e, "Failed to register metrics");
            None
        }
    }
});

const QUEUE_LABELS: &[&str] = &["account_id", "queue_name"];
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Metrics collector for nimbusq
pub struct Metrics {
    /// Total messages sent to queues (counter)
    pub messages_sent_total: IntCounterVec,
    /// Total messages received from queues (counter)
    pub messages_received_total: IntCounterVec,
    /// Total messages deleted from queues (counter)
    pub messages_deleted_total: IntCounterVec,
    /// Total messages moved to dead letter queues, labelled by source (counter)
    pub messages_to_dlq_total: IntCounterVec,
    /// Total messages removed by retention expiry (counter)
    pub messages_expired_total: IntCounterVec,
    /// Total messages removed by purge (counter)
    pub messages_purged_total: IntCounterVec,

    /// Message send latency in seconds (histogram)
    pub send_latency_seconds: Histogram,
    /// Receive latency in seconds, long-poll waits included (histogram)
    pub receive_latency_seconds: Histogram,

    /// Total number of queues (gauge)
    pub queue_count: IntGauge,
}

impl Metrics {
    /// Create a new, unregistered metrics instance
    pub fn new() -> Result<Self, prometheus::Error> {
        let counter = |name: &str, help: &str| IntCounterVec::new(Opts::new(name, help), QUEUE_LABELS);
        let histogram = |name: &str, help: &str| {
            Histogram::with_opts(HistogramOpts::new(name, help).buckets(LATENCY_BUCKETS.to_vec()))
        };

        Ok(Self {
            messages_sent_total: counter(
                "nimbusq_messages_sent_total",
                "Total messages sent to queues",
            )?,
            messages_received_total: counter(
                "nimbusq_messages_received_total",
                "Total messages received from queues",
            )?,
            messages_deleted_total: counter(
                "nimbusq_messages_deleted_total",
                "Total messages deleted from queues",
            )?,
            messages_to_dlq_total: counter(
                "nimbusq_messages_to_dlq_total",
                "Total messages moved to dead letter queue",
            )?,
            messages_expired_total: counter(
                "nimbusq_messages_expired_total",
                "Total messages removed by retention expiry",
            )?,
            messages_purged_total: counter(
                "nimbusq_messages_purged_total",
                "Total messages removed by purge",
            )?,
            send_latency_seconds: histogram(
                "nimbusq_send_latency_seconds",
                "Send message latency in seconds",
            )?,
            receive_latency_seconds: histogram(
                "nimbusq_receive_latency_seconds",
                "Receive message latency in seconds",
            )?,
            queue_count: IntGauge::new("nimbusq_queue_count", "Total number of queues")?,
        })
    }

    /// Register all metrics with the registry
    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.messages_sent_total.clone()))?;
        registry.register(Box::new(self.messages_received_total.clone()))?;
        registry.register(Box::new(self.messages_deleted_total.clone()))?;
        registry.register(Box::new(self.messages_to_dlq_total.clone()))?;
        registry.register(Box::new(self.messages_expired_total.clone()))?;
        registry.register(Box::new(self.messages_purged_total.clone()))?;
        registry.register(Box::new(self.send_latency_seconds.clone()))?;
        registry.register(Box::new(self.receive_latency_seconds.clone()))?;
        registry.register(Box::new(self.queue_count.clone()))?;
        Ok(())
    }
}

/// Get the global metrics instance
pub fn get_metrics() -> Option<Arc<Metrics>> {
    METRICS.clone()
}

/// Gather metrics in Prometheus text format
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
