//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by mode, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers, by mode
//! - `proxy_rewrites_total` (counter): rewritten URLs by kind (`direct`, `proxied`)
//! - `proxy_registry_hops` (histogram): hops taken per registry request
//! - `proxy_upstream_errors_total` (counter): failed upstream fetches by mode
//!
//! # Design Decisions
//! - Exporter is optional; the `metrics` facade drops records when none is installed
//! - Labels are low-cardinality (no hosts or paths)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(mode: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "mode" => mode,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rewrite(kind: &'static str) {
    metrics::counter!("proxy_rewrites_total", "kind" => kind).increment(1);
}

pub fn record_registry_hops(hops: usize) {
    metrics::histogram!("proxy_registry_hops").record(hops as f64);
}

pub fn record_upstream_error(mode: &'static str) {
    metrics::counter!("proxy_upstream_errors_total", "mode" => mode).increment(1);
}
