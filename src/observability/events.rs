//! Metric events emitted by the failover pipeline.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::error::FailureKind;

/// Final outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    /// Refused locally before the service was invoked.
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Where a successful result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Service,
    Cache,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Service => "service",
            EventSource::Cache => "cache",
        }
    }
}

/// Immutable record of one call outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEvent {
    pub request_id: Uuid,
    pub service: String,
    pub operation: String,
    pub outcome: Outcome,
    pub source: EventSource,
    /// Set for failures and rejections.
    pub kind: Option<FailureKind>,
    pub latency: Duration,
    /// Service invocations made (0 for cache hits and rejections).
    pub attempts: u32,
    pub timestamp: SystemTime,
}

impl MetricEvent {
    pub fn success(
        request_id: Uuid,
        service: &str,
        operation: &str,
        source: EventSource,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            request_id,
            service: service.to_string(),
            operation: operation.to_string(),
            outcome: Outcome::Success,
            source,
            kind: None,
            latency,
            attempts,
            timestamp: SystemTime::now(),
        }
    }

    /// Failure or rejection, depending on whether `kind` is a local rejection.
    pub fn failed(
        request_id: Uuid,
        service: &str,
        operation: &str,
        kind: FailureKind,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        let outcome = if kind.is_rejection() {
            Outcome::Rejected
        } else {
            Outcome::Failure
        };
        Self {
            request_id,
            service: service.to_string(),
            operation: operation.to_string(),
            outcome,
            source: EventSource::Service,
            kind: Some(kind),
            latency,
            attempts,
            timestamp: SystemTime::now(),
        }
    }

    /// Rejection for a call that named no registered service.
    pub fn rejected(request_id: Uuid, service: &str, operation: &str, kind: FailureKind) -> Self {
        Self {
            outcome: Outcome::Rejected,
            ..Self::failed(request_id, service, operation, kind, Duration::ZERO, 0)
        }
    }
}
