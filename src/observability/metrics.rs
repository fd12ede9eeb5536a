//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_refresh_cycles_total` (counter): cycles by outcome
//! - `config_refresh_failures_total` (counter): failures by kind
//! - `config_snapshot_version` (gauge): installed snapshot version
//! - `config_consecutive_failures` (gauge): current failure streak
//! - `config_fetch_duration_seconds` (histogram): time spent fetching all sources

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_cycle(outcome: &'static str) {
    counter!("config_refresh_cycles_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh_failure(kind: &'static str) {
    counter!("config_refresh_failures_total", "kind" => kind).increment(1);
}

pub fn record_snapshot_version(version: u64) {
    gauge!("config_snapshot_version").set(version as f64);
}

pub fn record_consecutive_failures(count: u32) {
    gauge!("config_consecutive_failures").set(count as f64);
}

pub fn record_fetch_duration(elapsed: Duration) {
    histogram!("config_fetch_duration_seconds").record(elapsed.as_secs_f64());
}
