//! Failover manager: the composition root.
//!
//! # Responsibilities
//! - Own the service registry and the shared response cache
//! - Run every call through the resilience pipeline (pipeline.rs)
//! - Fail over across services in registration order
//! - Probe service health and expose read-only status
//!
//! # Data Flow
//! ```text
//! execute(service, operation, params)
//!     → cache (idempotent operations only; hit returns immediately)
//!     → rate limiter (rejection: rate_limited)
//!     → circuit breaker (rejection: circuit_open)
//!     → ┌ overall deadline ─────────────────────────────┐
//!       │ pool acquire (pool_exhausted)                 │
//!       │ retry policy → Service::invoke(handle)        │
//!       └───────────────────────────────────────────────┘
//!     → circuit record, cache put, MetricEvent
//! ```

mod pipeline;
pub mod registry;
pub mod status;

pub use pipeline::Routed;
pub use registry::{RegistryError, ServiceEntry, ServiceRegistry};
pub use status::{ServiceCacheStats, ServiceStatus};

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::Instant;
use url::Url;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::{
    CacheConfig, FailoverConfig, HealthCheckConfig, ServiceConfig, ServiceKind, ServicePolicy,
};
use crate::health::HealthRecord;
use crate::observability::{metrics, MetricsSink, NoopSink};
use crate::resilience::RetryPolicy;
use crate::services::{HttpService, InternalService, Service};

/// Orchestrates calls to registered services.
pub struct FailoverManager {
    registry: ServiceRegistry,
    cache: ResponseCache,
    cache_enabled: bool,
    default_policy: ServicePolicy,
    health: HealthCheckConfig,
    sink: Arc<dyn MetricsSink>,
}

impl FailoverManager {
    pub fn builder() -> FailoverManagerBuilder {
        FailoverManagerBuilder::default()
    }

    /// Build a manager and register every service listed in `config`.
    pub fn from_config(
        config: &FailoverConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self, RegistryError> {
        let manager = Self::builder()
            .policy(config.default_policy())
            .cache(config.cache.clone())
            .health_check(config.health_check.clone())
            .sink(sink)
            .build();

        for service_config in &config.services {
            let service = build_service(config, service_config)?;
            manager.register_service_with(service, config.policy_for(service_config))?;
        }

        Ok(manager)
    }

    /// Register a service under the default policy.
    pub fn register_service(&self, service: Arc<dyn Service>) -> Result<(), RegistryError> {
        self.register_service_with(service, self.default_policy.clone())
    }

    /// Register a service with its own policy.
    pub fn register_service_with(
        &self,
        service: Arc<dyn Service>,
        policy: ServicePolicy,
    ) -> Result<(), RegistryError> {
        let retry = RetryPolicy::new(&policy.retry);
        self.register_service_with_retry(service, policy, retry)
    }

    /// Register a service with a custom retry policy (e.g. a different classifier).
    pub fn register_service_with_retry(
        &self,
        service: Arc<dyn Service>,
        policy: ServicePolicy,
        retry: RetryPolicy,
    ) -> Result<(), RegistryError> {
        let name = service.name().to_string();
        let entry = ServiceEntry::new(service, policy, retry, self.health.history_size);
        self.registry.insert(entry)?;
        tracing::info!(service = %name, "Service registered");
        Ok(())
    }

    /// Remove a service and drop its cached results.
    pub fn deregister_service(&self, name: &str) -> bool {
        match self.registry.remove(name) {
            Some(_) => {
                let dropped = self.cache.invalidate_service(name);
                tracing::info!(service = %name, cache_entries = dropped, "Service deregistered");
                true
            }
            None => false,
        }
    }

    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        let entry = self.registry.get(name)?;
        Some(ServiceStatus::from_entry(&entry, self.cache.len_for_service(name)))
    }

    /// Status of every service, in registration order.
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        self.registry
            .names()
            .iter()
            .filter_map(|name| self.status(name))
            .collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Probe one service and record the result. `None` if not registered.
    pub async fn check_health(&self, name: &str) -> Option<HealthRecord> {
        let entry = self.registry.get(name)?;
        Some(self.probe(&entry).await)
    }

    /// Probe every service concurrently.
    pub async fn check_all_health(&self) -> Vec<(String, HealthRecord)> {
        let entries: Vec<_> = self
            .registry
            .names()
            .iter()
            .filter_map(|name| self.registry.get(name))
            .collect();

        join_all(entries.iter().map(|entry| async move {
            (entry.name().to_string(), self.probe(entry).await)
        }))
        .await
    }

    async fn probe(&self, entry: &ServiceEntry) -> HealthRecord {
        let started = Instant::now();
        let timeout = self.health.timeout();
        let healthy = tokio::time::timeout(timeout, entry.service.health_check())
            .await
            .unwrap_or(false);
        let record = HealthRecord::new(healthy, started.elapsed());

        if healthy {
            tracing::debug!(service = %entry.name(), latency = ?record.latency, "Service healthy");
        } else {
            tracing::warn!(service = %entry.name(), latency = ?record.latency, "Service unhealthy");
        }
        metrics::record_service_health(entry.name(), healthy);
        entry.health.record(record.clone());
        record
    }
}

impl std::fmt::Debug for FailoverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverManager")
            .field("services", &self.registry.names())
            .field("cache", &self.cache)
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}

fn build_service(
    config: &FailoverConfig,
    service: &ServiceConfig,
) -> Result<Arc<dyn Service>, RegistryError> {
    match service.kind {
        ServiceKind::Internal => {
            let mut internal = InternalService::new(&service.name).discontinued(service.discontinued);
            if let Some(base_url) = &service.base_url {
                internal = internal.with_base_url(base_url);
            }
            Ok(Arc::new(internal))
        }
        ServiceKind::Http => {
            let raw = service
                .base_url
                .as_deref()
                .ok_or_else(|| RegistryError::MissingBaseUrl(service.name.clone()))?;
            let base_url = Url::parse(raw).map_err(|source| RegistryError::InvalidUrl {
                service: service.name.clone(),
                source,
            })?;

            let mut http = HttpService::new(&service.name, base_url, config.timeouts.request())
                .map_err(|source| RegistryError::Client {
                    service: service.name.clone(),
                    source,
                })?
                .with_health_path(&service.health_path)
                .with_health_timeout(config.health_check.timeout());
            if let Some(key) = &service.api_key {
                http = http.with_api_key(key);
            }
            Ok(Arc::new(http))
        }
    }
}

/// Builder for [`FailoverManager`].
pub struct FailoverManagerBuilder {
    policy: ServicePolicy,
    cache: CacheConfig,
    health: HealthCheckConfig,
    sink: Arc<dyn MetricsSink>,
}

impl Default for FailoverManagerBuilder {
    fn default() -> Self {
        Self {
            policy: ServicePolicy::default(),
            cache: CacheConfig::default(),
            health: HealthCheckConfig::default(),
            sink: Arc::new(NoopSink),
        }
    }
}

impl FailoverManagerBuilder {
    /// Default policy for services registered without one.
    pub fn policy(mut self, policy: ServicePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn health_check(mut self, health: HealthCheckConfig) -> Self {
        self.health = health;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> FailoverManager {
        FailoverManager {
            registry: ServiceRegistry::new(),
            cache: ResponseCache::new(&self.cache),
            cache_enabled: self.cache.enabled,
            default_policy: self.policy,
            health: self.health,
            sink: self.sink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[tokio::test]
    async fn test_from_config_registers_in_order() {
        let config = parse_config(
            r#"
            [[services]]
            name = "primary"
            kind = "http"
            base_url = "http://127.0.0.1:1"
            api_key = "secret"

            [[services]]
            name = "fallback"
            discontinued = true
            "#,
        )
        .unwrap();

        let manager = FailoverManager::from_config(&config, Arc::new(NoopSink)).unwrap();
        assert_eq!(manager.service_names(), vec!["primary", "fallback"]);
        assert_eq!(
            manager.status("primary").unwrap().base_url.as_deref(),
            Some("http://127.0.0.1:1/")
        );
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let manager = FailoverManager::builder().build();
        manager.register_service(Arc::new(InternalService::new("a"))).unwrap();
        let err = manager
            .register_service(Arc::new(InternalService::new("a")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_check_health_records_history() {
        let manager = FailoverManager::builder().build();
        manager
            .register_service(Arc::new(InternalService::new("down").discontinued(true)))
            .unwrap();

        let record = manager.check_health("down").await.unwrap();
        assert!(!record.healthy);
        assert!(manager.check_health("missing").await.is_none());
        assert_eq!(manager.status("down").unwrap().last_known_healthy(), Some(false));
    }

    #[tokio::test]
    async fn test_deregister() {
        let manager = FailoverManager::builder().build();
        manager.register_service(Arc::new(InternalService::new("a"))).unwrap();
        assert!(manager.deregister_service("a"));
        assert!(!manager.deregister_service("a"));
        assert!(manager.is_empty());
    }
}
