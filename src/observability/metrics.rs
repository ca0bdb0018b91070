//! Metrics collection and exposition.
//!
//! # Metrics
//! - `airtabler_dispatch_total` (counter): dispatch attempts by status
//! - `airtabler_dispatch_duration_seconds` (histogram): upstream call latency
//! - `airtabler_throttled_total` (counter): 429 responses absorbed
//! - `airtabler_transport_errors_total` (counter): failed calls by kind
//! - `airtabler_jobs_in_flight` (gauge): admitted, unfinished jobs
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed upstream call.
pub fn record_dispatch(status: u16, start: Instant) {
    counter!("airtabler_dispatch_total", "status" => status.to_string()).increment(1);
    histogram!("airtabler_dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_throttled() {
    counter!("airtabler_throttled_total").increment(1);
}

pub fn record_transport_error(kind: &'static str) {
    counter!("airtabler_transport_errors_total", "kind" => kind).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!("airtabler_jobs_in_flight").set(count as f64);
}
