//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): forwarded requests by backend, outcome
//! - `lb_request_duration_seconds` (histogram): latency by backend
//! - `lb_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `lb_circuit_transitions_total` (counter): breaker edges by backend, from, to
//! - `lb_circuit_open` (gauge): 1 while a backend's circuit is not closed
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so unit tests can exercise every call site.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Outcome of one forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Record a `{backend, duration, outcome}` request sample.
pub fn record_request(backend: &str, outcome: Outcome, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    counter!(
        "lb_requests_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds", "backend" => backend.to_string()).record(duration);
}

/// Record the current probe verdict for a backend.
pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("lb_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a circuit breaker state change.
pub fn record_circuit_transition(backend: &str, from: CircuitState, to: CircuitState) {
    counter!(
        "lb_circuit_transitions_total",
        "backend" => backend.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("lb_circuit_open", "backend" => backend.to_string()).set(match to {
        CircuitState::Closed => 0.0,
        CircuitState::Open | CircuitState::HalfOpen => 1.0,
    });
}

#[cfg(test)]
pub(crate) type Captured = (String, Vec<(String, String)>, metrics_util::debugging::DebugValue);

/// Run `f` against a local debugging recorder and return what it recorded
/// as `(name, labels, value)` triples.
#[cfg(test)]
pub(crate) fn capture<F: FnOnce()>(f: F) -> Vec<Captured> {
    use metrics_util::debugging::DebuggingRecorder;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, f);

    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, value)| {
            let key = key.key();
            let labels = key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            (key.name().to_string(), labels, value)
        })
        .collect()
}
