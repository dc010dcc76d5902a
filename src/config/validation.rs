//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts >= 1, jitter in [0, 1], capacities > 0)
//! - Check service names are unique and HTTP services have a usable base URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FailoverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{
    CircuitBreakerConfig, FailoverConfig, PoolConfig, RateLimitConfig, RetryConfig, ServiceKind,
};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `services[billing].retry.jitter`.
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_retry("retry", &config.retry, &mut errors);
    check_circuit("circuit_breaker", &config.circuit_breaker, &mut errors);
    check_rate_limit("rate_limit", &config.rate_limit, &mut errors);
    check_pool("pool", &config.pool, &mut errors);

    if config.cache.capacity == 0 {
        errors.push(ValidationError::new("cache.capacity", "must be greater than 0"));
    }
    if config.cache.shards == 0 {
        errors.push(ValidationError::new("cache.shards", "must be greater than 0"));
    }
    if config.timeouts.overall_deadline_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.overall_deadline_ms",
            "must be greater than 0",
        ));
    }
    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_secs",
            "must be greater than 0 when health checks are enabled",
        ));
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        let prefix = format!("services[{}]", service.name);

        if service.name.trim().is_empty() {
            errors.push(ValidationError::new("services.name", "must not be empty"));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::new(&prefix, "duplicate service name"));
        }

        if service.kind == ServiceKind::Http {
            match service.base_url.as_deref() {
                None => errors.push(ValidationError::new(
                    format!("{prefix}.base_url"),
                    "required for http services",
                )),
                Some(raw) => {
                    if let Err(e) = Url::parse(raw) {
                        errors.push(ValidationError::new(
                            format!("{prefix}.base_url"),
                            format!("invalid URL '{raw}': {e}"),
                        ));
                    }
                }
            }
        }

        if let Some(retry) = &service.retry {
            check_retry(&format!("{prefix}.retry"), retry, &mut errors);
        }
        if let Some(circuit) = &service.circuit_breaker {
            check_circuit(&format!("{prefix}.circuit_breaker"), circuit, &mut errors);
        }
        if let Some(rate) = &service.rate_limit {
            check_rate_limit(&format!("{prefix}.rate_limit"), rate, &mut errors);
        }
        if let Some(pool) = &service.pool {
            check_pool(&format!("{prefix}.pool"), pool, &mut errors);
        }
        if service.overall_deadline_ms == Some(0) {
            errors.push(ValidationError::new(
                format!("{prefix}.overall_deadline_ms"),
                "must be greater than 0",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.max_attempts"),
            "must be at least 1",
        ));
    }
    if retry.base_delay_ms == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.base_delay_ms"),
            "must be greater than 0",
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        errors.push(ValidationError::new(
            format!("{prefix}.jitter"),
            "must be within [0, 1]",
        ));
    }
    if let Some(max) = retry.max_delay_ms {
        if max < retry.base_delay_ms {
            errors.push(ValidationError::new(
                format!("{prefix}.max_delay_ms"),
                "must not be smaller than base_delay_ms",
            ));
        }
    }
}

fn check_circuit(prefix: &str, circuit: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    if circuit.failure_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.failure_threshold"),
            "must be at least 1",
        ));
    }
    if circuit.half_open_success_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.half_open_success_threshold"),
            "must be at least 1",
        ));
    }
}

fn check_rate_limit(prefix: &str, rate: &RateLimitConfig, errors: &mut Vec<ValidationError>) {
    if rate.capacity == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.capacity"),
            "must be greater than 0",
        ));
    }
    if rate.refill_rate <= 0.0 || !rate.refill_rate.is_finite() {
        errors.push(ValidationError::new(
            format!("{prefix}.refill_rate"),
            "must be a positive number",
        ));
    }
}

fn check_pool(prefix: &str, pool: &PoolConfig, errors: &mut Vec<ValidationError>) {
    if pool.max_size == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.max_size"),
            "must be at least 1",
        ));
    }
}
