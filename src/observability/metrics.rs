//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_calls_total` (counter): calls by service, operation, outcome, source
//! - `failover_rejections_total` (counter): local rejections by service, kind
//! - `failover_call_duration_seconds` (histogram): latency by service, operation
//! - `failover_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `failover_service_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is installed by the binary only

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::observability::events::{MetricEvent, Outcome};
use crate::resilience::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Forward one pipeline event.
pub fn record_event(event: &MetricEvent) {
    ::metrics::counter!(
        "failover_calls_total",
        "service" => event.service.clone(),
        "operation" => event.operation.clone(),
        "outcome" => event.outcome.as_str(),
        "source" => event.source.as_str()
    )
    .increment(1);

    ::metrics::histogram!(
        "failover_call_duration_seconds",
        "service" => event.service.clone(),
        "operation" => event.operation.clone()
    )
    .record(event.latency.as_secs_f64());

    if event.outcome == Outcome::Rejected {
        let kind = event.kind.map(|k| k.as_str()).unwrap_or("unknown");
        ::metrics::counter!(
            "failover_rejections_total",
            "service" => event.service.clone(),
            "kind" => kind
        )
        .increment(1);
    }
}

pub fn record_circuit_state(service: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    ::metrics::gauge!("failover_circuit_state", "service" => service.to_string()).set(value);
}

pub fn record_service_health(service: &str, healthy: bool) {
    ::metrics::gauge!("failover_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
