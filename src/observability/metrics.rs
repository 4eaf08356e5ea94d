//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_connected` (gauge): 1=connected, 0 otherwise
//! - `resilience_reconnects_scheduled_total` (counter)
//! - `resilience_reconnect_delay_seconds` (gauge): delay of the armed attempt
//! - `resilience_handshakes_total` (counter): by outcome
//! - `resilience_poll_fetches_total` (counter): by task, outcome
//! - `resilience_poll_ticks_skipped_total` (counter): by task
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::ConnectionStatus;
use crate::polling::PollKind;

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_status(status: ConnectionStatus) {
    let connected = if status == ConnectionStatus::Connected { 1.0 } else { 0.0 };
    gauge!("resilience_connected").set(connected);
}

pub fn record_reconnect_scheduled(delay: Duration) {
    counter!("resilience_reconnects_scheduled_total").increment(1);
    gauge!("resilience_reconnect_delay_seconds").set(delay.as_secs_f64());
}

pub fn record_handshake(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("resilience_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_fetch(task: PollKind, outcome: &'static str) {
    counter!("resilience_poll_fetches_total", "task" => task.name(), "outcome" => outcome).increment(1);
}

pub fn record_skipped_tick(task: PollKind) {
    counter!("resilience_poll_ticks_skipped_total", "task" => task.name()).increment(1);
}
