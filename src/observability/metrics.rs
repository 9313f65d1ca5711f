//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, upstream attempts, failovers)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route source
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_upstream_attempts_total` (counter): outbound attempts by outcome
//! - `gateway_failover_total` (counter): failover runs by result
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are low-cardinality (no URLs or paths)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &'static str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// One outbound attempt finished with `outcome` (`response`, `timeout`, ...).
pub fn record_upstream(outcome: &'static str) {
    metrics::counter!("gateway_upstream_attempts_total", "outcome" => outcome).increment(1);
}

/// A failover run ended: `recovered` by a mirror or `exhausted`.
pub fn record_failover(result: &'static str) {
    metrics::counter!("gateway_failover_total", "result" => result).increment(1);
}
