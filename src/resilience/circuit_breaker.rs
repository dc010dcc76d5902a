//! Circuit breaker for service protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, requests fail fast
//! - Half-Open: testing if service recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: recovery_time elapsed (checked lazily on the next request)
//! Half-Open → Closed: half_open_success_threshold consecutive probe successes
//! Half-Open → Open: any probe failure
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering service)
//! - A probe that ends without evidence (cancelled, rejected locally) frees its slot

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a finished call tells the breaker about the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    /// The call produced no evidence either way.
    Neutral,
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    pub probe_in_flight: bool,
    /// Time since the last state transition.
    pub since_transition: Duration,
    /// Times the circuit has tripped open.
    pub times_opened: u64,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    probe_in_flight: bool,
    last_transition: Instant,
    times_opened: u64,
}

/// Per-service three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                probe_in_flight: false,
                last_transition: Instant::now(),
                times_opened: 0,
            }),
        }
    }

    /// Whether a request may proceed now.
    ///
    /// Admitting the half-open probe marks it in flight; the caller must
    /// follow up with [`record`](Self::record).
    pub fn allow(&self) -> bool {
        self.try_admit().is_some()
    }

    /// Record the outcome of a request admitted by [`allow`](Self::allow).
    pub fn record(&self, outcome: CallOutcome) {
        let mut inner = self.inner.lock();
        let probe = inner.state == CircuitState::HalfOpen && inner.probe_in_flight;
        self.apply(&mut inner, outcome, probe);
    }

    /// Admit a request and return a permit that records its outcome.
    ///
    /// Dropping the permit without recording counts as [`CallOutcome::Neutral`].
    pub fn admit(&self) -> Option<CircuitPermit<'_>> {
        self.try_admit().map(|probe| CircuitPermit {
            breaker: self,
            probe,
            recorded: false,
        })
    }

    /// Current state without triggering the lazy Open → Half-Open check.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            probe_in_flight: inner.probe_in_flight,
            since_transition: inner.last_transition.elapsed(),
            times_opened: inner.times_opened,
        }
    }

    /// Returns `Some(is_probe)` when admitted.
    fn try_admit(&self) -> Option<bool> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::Open => {
                if inner.last_transition.elapsed() >= self.config.recovery_time() {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Some(true)
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(true)
                }
            }
        }
    }

    fn apply(&self, inner: &mut CircuitInner, outcome: CallOutcome, probe: bool) {
        match (inner.state, outcome) {
            (CircuitState::HalfOpen, _) if !probe => {
                // Stale result from a request admitted before the circuit opened.
            }
            (CircuitState::HalfOpen, CallOutcome::Neutral) => {
                inner.probe_in_flight = false;
            }
            (CircuitState::HalfOpen, CallOutcome::Success) => {
                inner.probe_in_flight = false;
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_success_threshold {
                    self.transition(inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, CallOutcome::Failure) => {
                inner.probe_in_flight = false;
                self.transition(inner, CircuitState::Open);
            }
            (CircuitState::Closed, CallOutcome::Success) => {
                inner.consecutive_failures = 0;
            }
            (CircuitState::Closed, CallOutcome::Failure) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(inner, CircuitState::Open);
                }
            }
            (CircuitState::Closed, CallOutcome::Neutral) | (CircuitState::Open, _) => {}
        }
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.last_transition = Instant::now();
        inner.half_open_successes = 0;
        if to != CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }

        match to {
            CircuitState::Open => {
                inner.times_opened += 1;
                tracing::warn!(
                    service = %self.service,
                    from = %from,
                    failures = inner.consecutive_failures,
                    recovery_time = ?self.config.recovery_time(),
                    "Circuit opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(service = %self.service, "Circuit half-open, admitting probe");
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                tracing::info!(service = %self.service, from = %from, "Circuit closed");
            }
        }
        metrics::record_circuit_state(&self.service, to);
    }
}

/// Admission granted by [`CircuitBreaker::admit`].
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    recorded: bool,
}

impl CircuitPermit<'_> {
    /// Whether this permit is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, outcome: CallOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: CallOutcome) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        let mut inner = self.breaker.inner.lock();
        self.breaker.apply(&mut inner, outcome, self.probe);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        self.finish(CallOutcome::Neutral);
    }
}
