//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FailoverConfig (validated, immutable)
//!     → policy_for() resolves defaults + per-service overrides
//!     → ServicePolicy handed to each registered service
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, CircuitBreakerConfig, FailoverConfig, HealthCheckConfig,
    ObservabilityConfig, PoolConfig, RateLimitConfig, RetryConfig, ServiceConfig, ServiceKind,
    ServicePolicy, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
