//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by kind (upload/passthrough) and status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency by kind
//! - `proxy_rule_runs_total` (counter): rule executions by rule and outcome
//! - `proxy_upload_pipeline_seconds` (histogram): time spent in the rule chain
//!
//! Recording is a no-op until a recorder is installed, so the library and its
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    metrics::counter!("proxy_requests_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rule(rule: &str, outcome: &'static str) {
    metrics::counter!("proxy_rule_runs_total", "rule" => rule.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_pipeline(start: Instant) {
    metrics::histogram!("proxy_upload_pipeline_seconds").record(start.elapsed().as_secs_f64());
}
