//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): chat requests by method, status, outcome
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_token_fetch_total` (counter): identity token fetches by outcome
//!
//! Recording is a no-op until a recorder is installed with `init_metrics`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished chat request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("proxy_requests_total", &labels[..]).increment(1);
    histogram!("proxy_request_duration_seconds", &labels[..]).record(start.elapsed().as_secs_f64());
}

/// Record one identity token fetch.
pub fn record_token_fetch(outcome: &str) {
    counter!("proxy_token_fetch_total", "outcome" => outcome.to_string()).increment(1);
}
