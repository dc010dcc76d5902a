//! The per-call execution pipeline.
//!
//! Steps run in a fixed order: cache → rate limit → circuit → pool → retry.
//! Rate limiting comes before the circuit so that local admission decisions
//! never reach circuit accounting.
//!
//! # Outcome Accounting
//! ```text
//! kind                 circuit    metric outcome
//! (success)            success    success
//! rate_limited         untouched  rejected
//! circuit_open         untouched  rejected
//! pool_exhausted       neutral    rejected
//! invalid_request      neutral    failure
//! deadline_exceeded    failure    failure
//! transport_failure    failure    failure
//! unknown              failure    failure
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::CacheKey;
use crate::error::{Failure, FailureKind};
use crate::manager::registry::ServiceEntry;
use crate::manager::FailoverManager;
use crate::observability::{EventSource, MetricEvent};
use crate::resilience::{with_deadline, Attempted, CallOutcome};
use crate::services::{Operation, Params, Payload};

/// Successful result of [`FailoverManager::execute_any`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routed {
    /// Service that produced the payload.
    pub service: String,
    pub payload: Payload,
}

impl FailoverManager {
    /// Run one call to `service` through the full pipeline.
    pub async fn execute(
        &self,
        service: &str,
        operation: &Operation,
        params: &Params,
    ) -> Result<Payload, Failure> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "execute",
            %request_id,
            service = %service,
            operation = %operation
        );
        self.run_pipeline(request_id, service, operation, params)
            .instrument(span)
            .await
    }

    /// Try each service in registration order until one succeeds.
    ///
    /// Moves on after rejections and service failures; stops at the first
    /// success or `invalid_request`.
    pub async fn execute_any(&self, operation: &Operation, params: &Params) -> Result<Routed, Failure> {
        let mut last_failure = None;

        for name in self.service_names() {
            if !self.contains(&name) {
                continue;
            }

            match self.execute(&name, operation, params).await {
                Ok(payload) => {
                    return Ok(Routed {
                        service: name,
                        payload,
                    });
                }
                Err(failure) if failure.kind == FailureKind::InvalidRequest => return Err(failure),
                Err(failure) => {
                    tracing::info!(
                        service = %name,
                        operation = %operation,
                        kind = %failure.kind,
                        "Failing over to next service"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| {
            Failure::new(FailureKind::InvalidRequest, "no services registered")
        }))
    }

    async fn run_pipeline(
        &self,
        request_id: Uuid,
        selector: &str,
        operation: &Operation,
        params: &Params,
    ) -> Result<Payload, Failure> {
        let started = Instant::now();

        let Some(entry) = self.registry.get(selector) else {
            tracing::warn!("Call to unregistered service");
            self.sink.record(MetricEvent::rejected(
                request_id,
                selector,
                &operation.name,
                FailureKind::InvalidRequest,
            ));
            return Err(Failure::new(
                FailureKind::InvalidRequest,
                format!("no service registered as '{selector}'"),
            ));
        };

        // 1. Cache
        let cache_key = (self.cache_enabled && operation.is_cacheable())
            .then(|| {
                CacheKey::new(entry.name(), &operation.name, params)
                    .with_generation(entry.generation())
            });
        if let Some(key) = &cache_key {
            let cached = self.cache.get(key);
            entry.record_cache_lookup(cached.is_some());
            if let Some(payload) = cached {
                tracing::debug!("Served from cache");
                self.sink.record(MetricEvent::success(
                    request_id,
                    entry.name(),
                    &operation.name,
                    EventSource::Cache,
                    started.elapsed(),
                    0,
                ));
                return Ok(payload);
            }
        }

        // 2. Rate limit
        if !entry.limiter.try_acquire() {
            return Err(self.reject(request_id, &entry, operation, FailureKind::RateLimited, started));
        }

        // 3. Circuit
        let Some(permit) = entry.circuit.admit() else {
            return Err(self.reject(request_id, &entry, operation, FailureKind::CircuitOpen, started));
        };

        // 4-5. Pool + retry, under the overall deadline
        let attempts = AtomicU32::new(0);
        let result = with_deadline(entry.policy.overall_deadline, async {
            let conn = entry.pool.acquire().await?;
            entry
                .retry
                .attempt(|| {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    entry.service.invoke(operation, params, &conn)
                })
                .await
        })
        .await;
        let elapsed = started.elapsed();

        match result {
            // 6. Success
            Ok(Attempted { value, attempts, .. }) => {
                permit.record(CallOutcome::Success);
                // A deregistered entry must not repopulate the cache.
                if let Some(key) = cache_key.filter(|_| self.registry.is_current(&entry)) {
                    self.cache.put(key, value.clone(), entry.policy.cache_ttl);
                }
                tracing::debug!(attempts, elapsed = ?elapsed, "Call succeeded");
                self.sink.record(MetricEvent::success(
                    request_id,
                    entry.name(),
                    &operation.name,
                    EventSource::Service,
                    elapsed,
                    attempts,
                ));
                Ok(value)
            }
            // 7. Failure
            Err(failure) => {
                let attempts = attempts.load(Ordering::Relaxed);
                let failure = failure.with_attempts(attempts, elapsed);

                permit.record(if failure.kind.counts_against_circuit() {
                    CallOutcome::Failure
                } else {
                    CallOutcome::Neutral
                });

                if failure.kind.is_rejection() {
                    tracing::warn!(kind = %failure.kind, "Call rejected");
                } else {
                    tracing::warn!(
                        kind = %failure.kind,
                        attempts,
                        elapsed = ?elapsed,
                        error = %failure.message,
                        "Call failed"
                    );
                }
                self.sink.record(MetricEvent::failed(
                    request_id,
                    entry.name(),
                    &operation.name,
                    failure.kind,
                    elapsed,
                    attempts,
                ));
                Err(failure)
            }
        }
    }

    fn reject(
        &self,
        request_id: Uuid,
        entry: &ServiceEntry,
        operation: &Operation,
        kind: FailureKind,
        started: Instant,
    ) -> Failure {
        tracing::debug!(kind = %kind, "Call rejected");
        let elapsed = started.elapsed();
        self.sink.record(MetricEvent::failed(
            request_id,
            entry.name(),
            &operation.name,
            kind,
            elapsed,
            0,
        ));
        Failure::rejected(kind, entry.name()).with_attempts(0, elapsed)
    }
}
