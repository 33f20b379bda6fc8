//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_selections_total` (counter): selections by algorithm, outcome
//! - `lb_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `lb_backend_active_connections` (gauge): in-flight requests per backend
//! - `lb_requests_total` (counter): HTTP requests by method, status
//! - `lb_request_duration_seconds` (histogram): HTTP latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::load_balancer::{Algorithm, BackendId, Snapshot};
use crate::observability::ObservabilityError;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), ObservabilityError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_selection(algorithm: Algorithm, hit: bool) {
    let outcome = if hit { "selected" } else { "unavailable" };
    counter!(
        "lb_selections_total",
        "algorithm" => algorithm.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_backend_health(backend: &BackendId, healthy: bool) {
    gauge!("lb_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Publish per-backend gauges from a status snapshot.
pub fn record_snapshot(snapshot: &Snapshot) {
    for backend in &snapshot.backends {
        let label = format!("{}:{}", backend.host, backend.port);
        gauge!("lb_backend_healthy", "backend" => label.clone())
            .set(if backend.healthy { 1.0 } else { 0.0 });
        gauge!("lb_backend_active_connections", "backend" => label)
            .set(backend.active_connections as f64);
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "lb_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
