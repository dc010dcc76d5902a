//! Service failover library.
//!
//! A resilience layer between callers and a set of services: every call runs
//! through a response cache, a per-service token bucket, a per-service circuit
//! breaker, a connection pool and a retry policy, in that order, and comes
//! back either as a payload or as a classified [`Failure`].

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod services;

pub use config::FailoverConfig;
pub use error::{CallResult, Failure, FailureKind, ServiceError};
pub use lifecycle::Shutdown;
pub use manager::{FailoverManager, Routed, ServiceStatus};
pub use services::{params, Operation, OperationKind, Params, Payload, Service};
