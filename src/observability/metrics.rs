//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): requests by method, status
//! - `bridge_request_duration_seconds` (histogram): latency distribution
//! - `bridge_rate_limited_total` (counter): rejections by route
//! - `bridge_pending_responses` (gauge): responses still tracked
//! - `bridge_active_connections` (gauge): open client connections
//! - `bridge_resident_memory_bytes` (gauge): process RSS
//! - `bridge_database_state` (gauge): storage link readiness code
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels kept low-cardinality (no paths, no client addresses)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::HealthReport;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "bridge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bridge_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    counter!("bridge_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_pending_responses(count: usize) {
    gauge!("bridge_pending_responses").set(count as f64);
}

/// Mirror a health report into gauges.
pub fn record_health(report: &HealthReport) {
    gauge!("bridge_resident_memory_bytes").set(report.memory.rss as f64);
    gauge!("bridge_database_state").set(f64::from(report.database_state));
    if let Some(connections) = report.connections {
        gauge!("bridge_active_connections").set(connections as f64);
    }
}
