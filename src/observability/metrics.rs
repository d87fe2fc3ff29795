//! Metrics collection and exposition.
//!
//! # Metrics
//! - `real_ip_requests_total` (counter): requests by substitution outcome
//! - `real_ip_connection_verdicts_total` (counter): trust decisions by verdict
//! - `real_ip_active_connections` (gauge): connections currently open
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::trust::cache::TrustVerdict;
use crate::trust::engine::Outcome;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_outcome(outcome: &Outcome) {
    metrics::counter!("real_ip_requests_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_verdict(verdict: &TrustVerdict) {
    metrics::counter!("real_ip_connection_verdicts_total", "verdict" => verdict.as_str()).increment(1);
}

pub fn record_connection_opened() {
    metrics::gauge!("real_ip_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("real_ip_active_connections").decrement(1.0);
}
