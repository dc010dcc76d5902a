//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a service:
//!     → rate_limit.rs (token bucket admission)
//!     → circuit_breaker.rs (fail fast while the service is judged down)
//!     → timeouts.rs (overall deadline around pool wait + attempts)
//!     → retries.rs (re-attempt transport failures with backoff.rs delays)
//!     → circuit_breaker.rs (record the final outcome)
//! ```
//!
//! # Design Decisions
//! - Each primitive is independent and owns its own lock
//! - Composition order lives in the manager, not in the primitives
//! - Rejections by rate limit or circuit never count as service failures

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CallOutcome, CircuitBreaker, CircuitPermit, CircuitSnapshot, CircuitState};
pub use rate_limit::RateLimiter;
pub use retries::{Attempted, RetryClassifier, RetryContext, RetryPolicy};
pub use timeouts::with_deadline;
