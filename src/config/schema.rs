//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the failover
//! layer. All types derive Serde traits for deserialization from config files.
//! Durations are expressed in milliseconds on disk and exposed as `Duration`
//! through accessor methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the failover layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FailoverConfig {
    /// Default retry policy for every service.
    pub retry: RetryConfig,

    /// Default circuit breaker settings for every service.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Default token bucket settings for every service.
    pub rate_limit: RateLimitConfig,

    /// Shared response cache settings.
    pub cache: CacheConfig,

    /// Default connection pool settings for every service.
    pub pool: PoolConfig,

    /// Deadline and transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Services registered at startup.
    pub services: Vec<ServiceConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl FailoverConfig {
    /// Policy applied to services registered without explicit overrides.
    pub fn default_policy(&self) -> ServicePolicy {
        ServicePolicy {
            retry: self.retry.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            rate_limit: self.rate_limit.clone(),
            pool: self.pool.clone(),
            cache_ttl: self.cache.ttl(),
            overall_deadline: self.timeouts.overall_deadline(),
        }
    }

    /// Effective policy for one configured service (defaults + overrides).
    pub fn policy_for(&self, service: &ServiceConfig) -> ServicePolicy {
        let defaults = self.default_policy();
        ServicePolicy {
            retry: service.retry.clone().unwrap_or(defaults.retry),
            circuit_breaker: service
                .circuit_breaker
                .clone()
                .unwrap_or(defaults.circuit_breaker),
            rate_limit: service.rate_limit.clone().unwrap_or(defaults.rate_limit),
            pool: service.pool.clone().unwrap_or(defaults.pool),
            cache_ttl: service
                .cache_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.cache_ttl),
            overall_deadline: service
                .overall_deadline_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.overall_deadline),
        }
    }
}

/// Resolved per-service policy, immutable once a service is registered.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePolicy {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub pool: PoolConfig,
    pub cache_ttl: Duration,
    pub overall_deadline: Duration,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        FailoverConfig::default().default_policy()
    }
}

/// How a configured service is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// In-process service.
    #[default]
    Internal,
    /// Remote HTTP API.
    Http,
}

/// A service registered from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name used as the selector.
    pub name: String,

    /// Transport variant.
    #[serde(default)]
    pub kind: ServiceKind,

    /// Base URL (required for HTTP services).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token sent to HTTP services.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path probed by health checks.
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Internal services only: every call fails when set.
    #[serde(default)]
    pub discontinued: bool,

    #[serde(default)]
    pub retry: Option<RetryConfig>,

    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    #[serde(default)]
    pub pool: Option<PoolConfig>,

    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,

    #[serde(default)]
    pub overall_deadline_ms: Option<u64>,
}

impl ServiceConfig {
    /// Minimal internal service entry.
    pub fn internal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::Internal,
            base_url: None,
            api_key: None,
            health_path: default_health_path(),
            discontinued: false,
            retry: None,
            circuit_breaker: None,
            rate_limit: None,
            pool: None,
            cache_ttl_ms: None,
            overall_deadline_ms: None,
        }
    }

    /// Minimal HTTP service entry.
    pub fn http(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            kind: ServiceKind::Http,
            base_url: Some(base_url.into()),
            ..Self::internal(name)
        }
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one (>= 1).
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    pub base_delay_ms: u64,

    /// Jitter fraction in [0, 1]; the delay is scaled by a factor in
    /// [1 - jitter, 1 + jitter].
    pub jitter: f64,

    /// Upper bound for the un-jittered delay in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            jitter: 0.5,
            max_delay_ms: Some(30_000),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit open.
    pub failure_threshold: u32,

    /// Time the circuit stays open before admitting a probe, in milliseconds.
    pub recovery_time_ms: u64,

    /// Consecutive half-open successes required to close the circuit.
    pub half_open_success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_time(&self) -> Duration {
        Duration::from_millis(self.recovery_time_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_time_ms: 60_000,
            half_open_success_threshold: 1,
        }
    }
}

/// Token bucket configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum burst size.
    pub capacity: u32,

    /// Tokens added per second.
    pub refill_rate: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_rate: 5.0,
        }
    }
}

/// Shared response cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disable to bypass the cache for every operation.
    pub enabled: bool,

    /// Maximum number of entries across all shards.
    pub capacity: usize,

    /// Default entry TTL in milliseconds.
    pub ttl_ms: u64,

    /// Number of independently locked shards. LRU order is exact per shard.
    pub shards: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            ttl_ms: 300_000,
            shards: 8,
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum handles in use at once.
    pub max_size: usize,

    /// Idle handles older than this are discarded, in milliseconds.
    pub max_idle_ms: u64,

    /// How long `acquire` waits for a free handle, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_idle_ms: 60_000,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole `execute` call (pool wait + attempts + delays).
    pub overall_deadline_ms: u64,

    /// Per-request timeout applied by the HTTP transport.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            overall_deadline_ms: 30_000,
            request_ms: 5_000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between rounds in seconds.
    pub interval_secs: u64,

    /// Probes slower than this count as unhealthy, in milliseconds.
    pub timeout_ms: u64,

    /// Records kept per service.
    pub history_size: usize,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_ms: 1_000,
            history_size: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,

    /// Recent metric events retained by the collector.
    pub recent_events: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            recent_events: 1024,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
