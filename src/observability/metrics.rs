//! Metrics collection and exposition.
//!
//! # Metrics
//! - `share_requests_total` (counter): dispatched requests by method, status
//! - `share_tunnel_starts_total` (counter): tunnel acquisitions by outcome
//! - `share_binary_downloads_total` (counter): provisioning downloads by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in via `observability.metrics_address`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "share_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_tunnel_start(outcome: &'static str) {
    metrics::counter!("share_tunnel_starts_total", "outcome" => outcome).increment(1);
}

pub fn record_download(outcome: &'static str) {
    metrics::counter!("share_binary_downloads_total", "outcome" => outcome).increment(1);
}
