//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webhook_requests_total` (counter): webhook outcomes by `outcome`
//! - `webhook_rate_limited_total` (counter): rejections by `limiter`
//! - `webhook_rate_limit_swept_total` (counter): idle identifiers removed
//! - `webhook_rate_limit_identifiers` (gauge): identifiers holding state
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter,
//!   so library users and tests pay nothing

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of a webhook request ("accepted", a rejection kind, ...).
pub fn record_webhook(outcome: &'static str) {
    counter!("webhook_requests_total", "outcome" => outcome).increment(1);
}

/// Record a rate-limit rejection.
pub fn record_rate_limited(limiter: &str) {
    counter!("webhook_rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}

/// Record the result of a sweep.
pub fn record_sweep(limiter: &str, removed: usize, tracked: usize) {
    counter!("webhook_rate_limit_swept_total", "limiter" => limiter.to_string())
        .increment(removed as u64);
    gauge!("webhook_rate_limit_identifiers", "limiter" => limiter.to_string()).set(tracked as f64);
}
