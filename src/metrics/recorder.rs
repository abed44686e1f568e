//! Metrics recording implementation using Prometheus.

use prometheus::{
    CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records one call to a serverless function with its outcome.
    fn record_remote_call(&self, endpoint: &str, result: &str);

    /// Records the duration of a call to a serverless function.
    fn record_remote_duration(&self, endpoint: &str, duration_secs: f64);

    /// Records a cache lookup; `result` is `hit`, `stale` or `miss`.
    fn record_cache_lookup(&self, cache: &str, result: &str);

    fn record_resolver_attempt(&self, result: &str);

    fn record_callback(&self, outcome: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Serverless function calls
    remote_calls_total: CounterVec,
    remote_call_duration_seconds: HistogramVec,

    cache_lookups_total: CounterVec,

    // Session
    resolver_attempts_total: CounterVec,
    callbacks_total: CounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let remote_calls_total = register_counter_vec_with_registry!(
            Opts::new(
                "postpulse_remote_calls_total",
                "Total calls to serverless functions"
            ),
            &["endpoint", "result"],
            registry.clone()
        )
        .expect("Failed to register postpulse_remote_calls_total");

        let remote_call_duration_seconds = register_histogram_vec_with_registry!(
            "postpulse_remote_call_duration_seconds",
            "Serverless function call duration in seconds",
            &["endpoint"],
            vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            registry.clone()
        )
        .expect("Failed to register postpulse_remote_call_duration_seconds");

        let cache_lookups_total = register_counter_vec_with_registry!(
            Opts::new("postpulse_cache_lookups_total", "Cache lookups by outcome"),
            &["cache", "result"],
            registry.clone()
        )
        .expect("Failed to register postpulse_cache_lookups_total");

        let resolver_attempts_total = register_counter_vec_with_registry!(
            Opts::new(
                "postpulse_resolver_attempts_total",
                "User id resolution attempts"
            ),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register postpulse_resolver_attempts_total");

        let callbacks_total = register_counter_vec_with_registry!(
            Opts::new(
                "postpulse_callbacks_total",
                "OAuth callback page loads by outcome"
            ),
            &["outcome"],
            registry.clone()
        )
        .expect("Failed to register postpulse_callbacks_total");

        Metrics {
            registry,
            remote_calls_total,
            remote_call_duration_seconds,
            cache_lookups_total,
            resolver_attempts_total,
            callbacks_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| format!("Metrics encoding produced invalid UTF-8: {}", e))
    }
}

impl MetricsRecorder for Metrics {
    fn record_remote_call(&self, endpoint: &str, result: &str) {
        self.remote_calls_total
            .with_label_values(&[endpoint, result])
            .inc();
    }

    fn record_remote_duration(&self, endpoint: &str, duration_secs: f64) {
        self.remote_call_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    fn record_cache_lookup(&self, cache: &str, result: &str) {
        self.cache_lookups_total
            .with_label_values(&[cache, result])
            .inc();
    }

    fn record_resolver_attempt(&self, result: &str) {
        self.resolver_attempts_total
            .with_label_values(&[result])
            .inc();
    }

    fn record_callback(&self, outcome: &str) {
        self.callbacks_total.with_label_values(&[outcome]).inc();
    }
}
