//! Prometheus metrics for the chat fanout service.
//!
//! Connection, ingest and delivery counters are recorded by the registry,
//! the ingest pipeline and the broadcast engine; `gather_metrics` renders
//! them for the `/metrics` endpoint.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "chat_fanout";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Sockets currently attached to this node
    pub static ref CONNECTIONS_ACTIVE: IntGauge = IntGauge::with_opts(
        Opts::new("connections_active", "Number of live WebSocket connections").namespace(NAMESPACE)
    ).expect("Failed to create CONNECTIONS_ACTIVE metric");

    /// Connections registered since start
    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("connections_total", "Total number of registered connections").namespace(NAMESPACE)
    ).expect("Failed to create CONNECTIONS_TOTAL metric");

    /// Messages accepted and persisted
    pub static ref MESSAGES_INGESTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("messages_ingested_total", "Total number of persisted messages").namespace(NAMESPACE)
    ).expect("Failed to create MESSAGES_INGESTED_TOTAL metric");

    /// Ingest rejections
    ///
    /// Labels: reason (validation, persist)
    pub static ref INGEST_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("ingest_rejections_total", "Total number of rejected messages").namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create INGEST_REJECTIONS_TOTAL metric");

    /// Delivery attempt outcomes
    ///
    /// Labels: outcome (delivered, peer_gone, transient_error)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deliveries_total", "Total number of delivery attempts by outcome").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create DELIVERIES_TOTAL metric");

    /// Peers removed after a gone signal
    pub static ref PEERS_PRUNED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("peers_pruned_total", "Total number of connections pruned during fanout").namespace(NAMESPACE)
    ).expect("Failed to create PEERS_PRUNED_TOTAL metric");

    /// Time to complete one broadcast, pruning included
    pub static ref BROADCAST_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("broadcast_duration_seconds", "Broadcast duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("Failed to create BROADCAST_DURATION_SECONDS metric");
}

/// Register all metrics with the global registry
///
/// Returns an error if called more than once per process.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(CONNECTIONS_ACTIVE.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(CONNECTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MESSAGES_INGESTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INGEST_REJECTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(DELIVERIES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PEERS_PRUNED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BROADCAST_DURATION_SECONDS.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_counters() {
        DELIVERIES_TOTAL.with_label_values(&["delivered"]).inc();
        assert!(DELIVERIES_TOTAL.with_label_values(&["delivered"]).get() >= 1);
    }

    #[test]
    fn test_gather_metrics() {
        // Only the first caller in the process registers successfully
        let _ = init_metrics();
        CONNECTIONS_TOTAL.inc();

        let metrics = gather_metrics();
        assert!(metrics.contains("chat_fanout_connections_total"));
    }
}
