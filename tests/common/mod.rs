//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use service_failover::config::{
    CacheConfig, CircuitBreakerConfig, PoolConfig, RateLimitConfig, RetryConfig, ServicePolicy,
};
use service_failover::error::ServiceError;
use service_failover::observability::{MetricEvent, MetricsSink, Outcome};
use service_failover::pool::PooledConnection;
use service_failover::{FailoverManager, FailureKind, Operation, Params, Payload, Service};

type Reply = (Duration, Result<Payload, ServiceError>);

/// Service that replays a script of replies, then repeats a fallback reply.
pub struct ScriptedService {
    name: String,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    healthy: AtomicBool,
    calls: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
}

impl ScriptedService {
    /// Always succeeds immediately.
    pub fn ok(name: &str) -> Self {
        Self::with_fallback(name, Ok(json!({ "from": name })))
    }

    /// Always fails immediately with a transport failure.
    pub fn failing(name: &str) -> Self {
        Self::with_fallback(name, Err(ServiceError::transport("connection refused")))
    }

    pub fn with_fallback(name: &str, fallback: Result<Payload, ServiceError>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: (Duration::ZERO, fallback),
            healthy: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
        }
    }

    /// Queue a reply returned after `delay`.
    pub fn then(self, delay: Duration, reply: Result<Payload, ServiceError>) -> Self {
        self.script.lock().push_back((delay, reply));
        self
    }

    /// Delay applied to the fallback reply.
    pub fn fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback.0 = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicU32);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Service for ScriptedService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        _operation: &Operation,
        _params: &Params,
        _conn: &PooledConnection,
    ) -> Result<Payload, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let (delay, reply) = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Sink that keeps every event for inspection.
#[derive(Default)]
pub struct CapturingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl CapturingSink {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn last(&self) -> MetricEvent {
        self.events.lock().last().cloned().expect("no events recorded")
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.events.lock().iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn kinds(&self) -> Vec<Option<FailureKind>> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }
}

impl MetricsSink for CapturingSink {
    fn record(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }
}

/// Deterministic policy: no jitter, generous limits.
pub fn test_policy() -> ServicePolicy {
    ServicePolicy {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            jitter: 0.0,
            max_delay_ms: None,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            recovery_time_ms: 1_000,
            half_open_success_threshold: 1,
        },
        rate_limit: RateLimitConfig {
            capacity: 1_000,
            refill_rate: 1_000.0,
        },
        pool: PoolConfig {
            max_size: 4,
            max_idle_ms: 60_000,
            acquire_timeout_ms: 1_000,
        },
        cache_ttl: Duration::from_secs(1),
        overall_deadline: Duration::from_secs(30),
    }
}

/// Manager with a single-shard cache and a capturing sink.
pub fn manager_with_sink(policy: ServicePolicy) -> (Arc<FailoverManager>, Arc<CapturingSink>) {
    let sink = Arc::new(CapturingSink::default());
    let manager = FailoverManager::builder()
        .policy(policy)
        .cache(CacheConfig {
            shards: 1,
            ..CacheConfig::default()
        })
        .sink(Arc::clone(&sink) as Arc<dyn MetricsSink>)
        .build();
    (Arc::new(manager), sink)
}

/// Register `service` and hand back the shared handle.
pub fn register(manager: &FailoverManager, service: ScriptedService) -> Arc<ScriptedService> {
    let service = Arc::new(service);
    manager
        .register_service(Arc::clone(&service) as Arc<dyn Service>)
        .unwrap();
    service
}
