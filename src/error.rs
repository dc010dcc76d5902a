//! Failure taxonomy shared by every resilience primitive.
//!
//! # Responsibilities
//! - Classify every way a call can fail into a closed set of kinds
//! - Carry attempt count and elapsed time back to the caller
//! - Decide which kinds are retried and which count against a circuit
//!
//! # Design Decisions
//! - Transports return `ServiceError`; only the manager builds `Failure`
//! - Local admission decisions (rate limit, open circuit, pool) are rejections,
//!   not evidence about the service
//! - `Unknown` is never retried

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected locally by the per-service token bucket.
    RateLimited,
    /// Rejected locally because the circuit is open (or a probe is in flight).
    CircuitOpen,
    /// No pooled connection became free before the acquire timeout.
    PoolExhausted,
    /// The overall deadline elapsed before the call finished.
    DeadlineExceeded,
    /// Network, timeout or 5xx-class failure. Retryable.
    TransportFailure,
    /// Validation or 4xx-class failure. Never retried.
    InvalidRequest,
    /// Unclassified fault. Never retried.
    Unknown,
}

impl FailureKind {
    /// Stable snake_case name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::PoolExhausted => "pool_exhausted",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Whether the default retry classifier re-attempts this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::TransportFailure)
    }

    /// Whether the call was refused before it reached the service.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::CircuitOpen | FailureKind::PoolExhausted
        )
    }

    /// Whether this outcome is evidence that the service is unhealthy.
    ///
    /// Rejections never reached the service and `InvalidRequest` means the
    /// service answered, so neither moves the circuit.
    pub fn counts_against_circuit(&self) -> bool {
        matches!(
            self,
            FailureKind::TransportFailure | FailureKind::DeadlineExceeded | FailureKind::Unknown
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a service transport for a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Retryable network/timeout/5xx failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TransportFailure, message)
    }

    /// Non-retryable validation/4xx failure.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidRequest, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }
}

/// Classified failure returned to callers of the failover manager.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message} (attempts: {attempts_made}, elapsed: {total_elapsed:?})")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Invocations of the service made before giving up (0 for rejections).
    pub attempts_made: u32,
    pub total_elapsed: Duration,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts_made: 0,
            total_elapsed: Duration::ZERO,
        }
    }

    /// Rejection raised before the service was invoked.
    pub fn rejected(kind: FailureKind, service: &str) -> Self {
        let message = match kind {
            FailureKind::RateLimited => format!("rate limit exceeded for service '{service}'"),
            FailureKind::CircuitOpen => format!("circuit open for service '{service}'"),
            FailureKind::PoolExhausted => {
                format!("no pooled connection available for service '{service}'")
            }
            other => format!("{other} for service '{service}'"),
        };
        Self::new(kind, message)
    }

    /// Tag the failure with the retry bookkeeping of the call sequence.
    pub fn with_attempts(mut self, attempts_made: u32, total_elapsed: Duration) -> Self {
        self.attempts_made = attempts_made;
        self.total_elapsed = total_elapsed;
        self
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Self::new(err.kind, err.message)
    }
}

/// Result type for calls made through the failover manager.
pub type CallResult<T> = Result<T, Failure>;
