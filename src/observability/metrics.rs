//! Metrics collection and exposition.
//!
//! # Metrics
//! - `telemetry_spans_exported_total` (counter): spans delivered to the collector
//! - `telemetry_spans_dropped_total` (counter): spans lost, by reason
//! - `telemetry_export_duration_seconds` (histogram): export latency, by exporter
//! - `telemetry_export_inflight` (gauge): export requests in flight
//! - `process_cpu_percent`, `process_resident_memory_bytes`,
//!   `process_heap_used_bytes` (gauges): latest sampler reading
//! - `http_handler_failures_total` (counter): failed requests, by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus scrape endpoint is opt-in

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

pub fn record_spans_exported(count: u64) {
    metrics::counter!("telemetry_spans_exported_total").increment(count);
}

pub fn record_spans_dropped(count: u64, reason: &'static str) {
    metrics::counter!("telemetry_spans_dropped_total", "reason" => reason).increment(count);
}

pub fn set_export_inflight(inflight: u64) {
    metrics::gauge!("telemetry_export_inflight").set(inflight as f64);
}

pub fn record_export_duration(exporter: &str, started: Instant) {
    metrics::histogram!("telemetry_export_duration_seconds", "exporter" => exporter.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_process_sample(cpu_percent: f64, resident_memory_bytes: u64, heap_used_bytes: u64) {
    metrics::gauge!("process_cpu_percent").set(cpu_percent);
    metrics::gauge!("process_resident_memory_bytes").set(resident_memory_bytes as f64);
    metrics::gauge!("process_heap_used_bytes").set(heap_used_bytes as f64);
}

pub fn record_handler_failure(route: &str) {
    metrics::counter!("http_handler_failures_total", "route" => route.to_string()).increment(1);
}
