//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → FailoverManager::check_all_health
//!     → Service::health_check per service (bounded by timeout)
//!     → state.rs history + failover_service_health gauge
//! ```
//!
//! # Design Decisions
//! - Health is observational; the circuit breaker alone gates traffic
//! - History is per-service and bounded

pub mod active;
pub mod state;

pub use active::HealthMonitor;
pub use state::{HealthHistory, HealthRecord, RECENT_HEALTH_RECORDS};
