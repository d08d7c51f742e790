//! Observability infrastructure for the metrics adapter
//!
//! Provides:
//! - Prometheus self-metrics (query latency, query errors, observed nodes)
//! - Structured JSON logging with tracing

use crate::error::ProviderError;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for query latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AdapterMetricsInner> = OnceLock::new();

struct AdapterMetricsInner {
    query_latency_seconds: HistogramVec,
    query_errors: IntCounterVec,
    nodes_observed: IntGauge,
}

impl AdapterMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram_vec!(
                "cluster_metrics_adapter_query_latency_seconds",
                "Time spent answering a metrics query",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            query_errors: register_int_counter_vec!(
                "cluster_metrics_adapter_query_errors_total",
                "Total number of failed metrics queries",
                &["operation", "kind"]
            )
            .expect("Failed to register query_errors"),

            nodes_observed: register_int_gauge!(
                "cluster_metrics_adapter_nodes_observed",
                "Number of nodes returned by the last inventory read"
            )
            .expect("Failed to register nodes_observed"),
        }
    }
}

/// Adapter metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying collectors.
#[derive(Clone)]
pub struct AdapterMetrics {
    _private: (),
}

impl Default for AdapterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterMetrics {
    /// Create a new metrics handle (registers the collectors on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AdapterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AdapterMetricsInner {
        GLOBAL_METRICS.get_or_init(AdapterMetricsInner::new)
    }

    /// Record how long a query took
    pub fn observe_query_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .query_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Count a failed query
    pub fn inc_query_errors(&self, operation: &str, kind: &str) {
        self.inner()
            .query_errors
            .with_label_values(&[operation, kind])
            .inc();
    }

    /// Record the node count of the latest inventory read
    pub fn set_nodes_observed(&self, count: i64) {
        self.inner().nodes_observed.set(count);
    }
}

/// Structured logger for adapter events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, message: &str) {
        info!(
            event = "adapter_started",
            instance = %self.instance,
            adapter_version = %version,
            "{}",
            message
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "adapter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Cluster metrics adapter shutting down"
        );
    }

    /// Log a successfully answered query
    pub fn log_query(&self, operation: &str, metric: &str, items: usize, duration_secs: f64) {
        info!(
            event = "metric_query",
            instance = %self.instance,
            operation = %operation,
            metric = %metric,
            items = items,
            duration_secs = duration_secs,
            "Served metric query"
        );
    }

    /// Log a failed query
    pub fn log_query_failed(&self, operation: &str, metric: &str, error: &ProviderError) {
        match error {
            ProviderError::MetricNotFound(_) | ProviderError::NoMatchingObjects => {
                info!(
                    event = "metric_query_failed",
                    instance = %self.instance,
                    operation = %operation,
                    metric = %metric,
                    kind = error.kind(),
                    error = %error,
                    "Metric query rejected"
                );
            }
            _ => {
                warn!(
                    event = "metric_query_failed",
                    instance = %self.instance,
                    operation = %operation,
                    metric = %metric,
                    kind = error.kind(),
                    error = %error,
                    "Metric query failed"
                );
            }
        }
    }
}
