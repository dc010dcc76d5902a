//! Registry of services and their per-service resilience state.
//!
//! # Design Decisions
//! - One `ServiceEntry` per service holds its circuit, bucket, pool and
//!   health history, each behind its own lock
//! - The table is a `DashMap`, so lookups for unrelated services never contend
//! - Registration order is kept separately for ordered failover

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::config::ServicePolicy;
use crate::health::HealthHistory;
use crate::pool::ConnectionPool;
use crate::resilience::{CircuitBreaker, RateLimiter, RetryPolicy};
use crate::services::Service;

/// Errors raised while registering services.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service '{0}' is already registered")]
    Duplicate(String),

    #[error("service '{0}' needs a base_url")]
    MissingBaseUrl(String),

    #[error("service '{service}' has an invalid base_url: {source}")]
    InvalidUrl {
        service: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client for service '{service}': {source}")]
    Client {
        service: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A registered service and all state the pipeline keeps for it.
pub struct ServiceEntry {
    pub(crate) service: Arc<dyn Service>,
    pub(crate) policy: ServicePolicy,
    pub(crate) retry: RetryPolicy,
    pub(crate) circuit: CircuitBreaker,
    pub(crate) limiter: RateLimiter,
    pub(crate) pool: Arc<ConnectionPool>,
    pub(crate) health: HealthHistory,
    generation: u64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl ServiceEntry {
    pub(crate) fn new(
        service: Arc<dyn Service>,
        policy: ServicePolicy,
        retry: RetryPolicy,
        health_history: usize,
    ) -> Self {
        let name = service.name().to_string();
        Self {
            circuit: CircuitBreaker::new(name.clone(), policy.circuit_breaker.clone()),
            limiter: RateLimiter::new(&policy.rate_limit),
            pool: ConnectionPool::new(name, policy.pool.clone()),
            health: HealthHistory::new(health_history),
            service,
            policy,
            retry,
            generation: 0,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    pub fn policy(&self) -> &ServicePolicy {
        &self.policy
    }

    /// Distinct for every registration, even under a reused name.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn record_cache_lookup(&self, hit: bool) {
        let counter = if hit { &self.cache_hits } else { &self.cache_misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_lookups(&self) -> (u64, u64) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name())
            .field("policy", &self.policy)
            .field("circuit", &self.circuit.state())
            .finish_non_exhaustive()
    }
}

/// Indexed table of registered services.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: DashMap<String, Arc<ServiceEntry>>,
    order: RwLock<Vec<String>>,
    next_generation: AtomicU64,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Both mutations hold the order lock across the map update, so `order`
    // and `entries` always agree on the set of names.
    pub fn insert(&self, mut entry: ServiceEntry) -> Result<Arc<ServiceEntry>, RegistryError> {
        let name = entry.name().to_string();
        let mut order = self.order.write();
        match self.entries.entry(name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate(name)),
            Entry::Vacant(vacant) => {
                entry.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let entry = Arc::new(entry);
                vacant.insert(Arc::clone(&entry));
                order.push(name);
                Ok(entry)
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        let mut order = self.order.write();
        let (_, entry) = self.entries.remove(name)?;
        order.retain(|n| n != name);
        Some(entry)
    }

    /// Whether `entry` is still the live registration for its name.
    pub fn is_current(&self, entry: &Arc<ServiceEntry>) -> bool {
        self.entries
            .get(entry.name())
            .is_some_and(|current| Arc::ptr_eq(current.value(), entry))
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.entries.get(name).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Service names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
