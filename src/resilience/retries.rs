//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failure is retryable (transport failures only by default)
//! - Execute retries with exponential backoff + jitter
//! - Tag the final outcome with attempts made and elapsed time
//!
//! # Design Decisions
//! - Attempt 1 always runs; `max_attempts` counts it
//! - Delays are tokio sleeps, so an enclosing deadline cancels them promptly
//! - Non-retryable failures surface immediately, untouched

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::error::{Failure, ServiceError};
use crate::resilience::backoff::calculate_backoff;

/// Predicate deciding whether a failed attempt may be re-attempted.
pub type RetryClassifier = Arc<dyn Fn(&ServiceError) -> bool + Send + Sync>;

/// Bookkeeping for one call sequence. Dropped when the sequence ends.
#[derive(Debug)]
pub struct RetryContext {
    attempts: u32,
    started: Instant,
    last_error: Option<ServiceError>,
}

impl RetryContext {
    fn new() -> Self {
        Self {
            attempts: 0,
            started: Instant::now(),
            last_error: None,
        }
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }

    fn into_failure(self) -> Failure {
        let elapsed = self.elapsed();
        let attempts = self.attempts;
        self.last_error
            .map(Failure::from)
            .unwrap_or_else(|| Failure::from(ServiceError::unknown("no attempt was made")))
            .with_attempts(attempts, elapsed)
    }
}

/// Successful result of a retried call sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Retry policy with exponential backoff and symmetric jitter.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter: f64,
    classifier: RetryClassifier,
}

impl RetryPolicy {
    /// Build a policy from configuration with the default classifier.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter: if config.jitter.is_finite() {
                config.jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
            classifier: Arc::new(|err: &ServiceError| err.kind.is_retryable()),
        }
    }

    /// Policy that never re-attempts.
    pub fn no_retry() -> Self {
        Self::new(&RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        })
    }

    /// Replace the retryability predicate.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&ServiceError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails non-retryably, or attempts run out.
    pub async fn attempt<T, F, Fut>(&self, mut operation: F) -> Result<Attempted<T>, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut ctx = RetryContext::new();

        loop {
            ctx.attempts += 1;

            let err = match operation().await {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: ctx.attempts,
                        elapsed: ctx.elapsed(),
                    });
                }
                Err(err) => err,
            };

            let retryable = (self.classifier)(&err);
            if !retryable {
                tracing::debug!(attempt = ctx.attempts, kind = %err.kind, "Failure is not retryable");
                ctx.last_error = Some(err);
                return Err(ctx.into_failure());
            }

            if ctx.attempts >= self.max_attempts {
                tracing::warn!(
                    attempts = ctx.attempts,
                    error = %err,
                    "Retry attempts exhausted"
                );
                ctx.last_error = Some(err);
                return Err(ctx.into_failure());
            }

            let delay = calculate_backoff(ctx.attempts, self.base_delay, self.max_delay, self.jitter);
            tracing::info!(
                attempt = ctx.attempts,
                delay = ?delay,
                error = %err,
                "Retrying after failure"
            );
            ctx.last_error = Some(err);
            tokio::time::sleep(delay).await;
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}
