//! Metrics collection and exposition.
//!
//! # Metrics
//! - `portal_requests_total` (counter): requests by method, status, route pattern
//! - `portal_request_duration_seconds` (histogram): latency by method and route pattern
//! - `portal_dispatch_errors_total` (counter): misconfigured routes hit at runtime
//!
//! # Design Decisions
//! - Route label is the matched pattern, never the raw path (bounded cardinality)
//! - Unmatched requests are labelled `not_found`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one handled request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "portal_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "portal_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch_error(route: &str) {
    metrics::counter!("portal_dispatch_errors_total", "route" => route.to_string()).increment(1);
}
