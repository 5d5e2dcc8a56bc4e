//! Metrics collection and exposition.
//!
//! # Metrics
//! - `newsletter_requests_total` (counter): requests by method, route, status
//! - `newsletter_request_duration_seconds` (histogram): latency by route
//! - `newsletter_lookups_total` (counter): key probes by pattern and outcome
//!
//! Macros are no-ops until a recorder is installed, so tests never need one.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "newsletter_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("newsletter_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_lookup(pattern: &str, outcome: &str) {
    metrics::counter!(
        "newsletter_lookups_total",
        "pattern" => pattern.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
