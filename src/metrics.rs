//! Prometheus metrics for layer requests and remote engine calls.
//!
//! This module provides metrics for:
//! - Layer requests by outcome
//! - Images found per request
//! - Earth Engine call latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{debug, info};

// === Metric Name Constants ===

/// Layer requests counter metric name.
pub const METRIC_LAYER_REQUESTS: &str = "layer_requests_total";
/// Images found histogram metric name.
pub const METRIC_IMAGES_FOUND: &str = "layer_images_found";
/// Layer request latency metric name.
pub const METRIC_LAYER_LATENCY: &str = "layer_request_latency_ms";
/// Earth Engine call latency metric name.
pub const METRIC_ENGINE_LATENCY: &str = "engine_call_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_LAYER_REQUESTS,
        "Total number of layer requests by outcome"
    );
    describe_histogram!(
        METRIC_IMAGES_FOUND,
        "Number of archive images matching a layer request"
    );
    describe_histogram!(
        METRIC_LAYER_LATENCY,
        "End-to-end layer request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_ENGINE_LATENCY,
        "Earth Engine call latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus exporter with its own HTTP listener.
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Count a finished layer request.
pub fn inc_layer_requests(outcome: &'static str) {
    counter!(METRIC_LAYER_REQUESTS, "outcome" => outcome).increment(1);
}

/// Record how many images a request matched.
pub fn record_images_found(count: u64) {
    histogram!(METRIC_IMAGES_FOUND).record(count as f64);
}

/// Record Earth Engine call latency.
pub fn record_engine_latency(start: Instant, call: &'static str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ENGINE_LATENCY, "call" => call).record(latency_ms);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for a whole layer request.
pub fn timer_layer_request() -> LatencyTimer {
    LatencyTimer::new(METRIC_LAYER_LATENCY)
}
