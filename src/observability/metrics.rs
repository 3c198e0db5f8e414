//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shutdown_drain_started_total` (counter): drains started, by source
//! - `shutdown_rejected_requests_total` (counter): 503s served, by format
//! - `shutdown_faults_total` (counter): faults acted on, by policy
//! - `shutdown_draining` (gauge): 1 once draining

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    metrics::describe_counter!(
        "shutdown_drain_started_total",
        "Drains started, labelled by the triggering source"
    );
    metrics::describe_counter!(
        "shutdown_rejected_requests_total",
        "Requests rejected with 503 while draining"
    );
    metrics::describe_counter!(
        "shutdown_faults_total",
        "Unrecoverable faults handled, labelled by policy"
    );
    metrics::describe_gauge!("shutdown_draining", "1 while the server is draining");
    metrics::gauge!("shutdown_draining").set(0.0);
}
