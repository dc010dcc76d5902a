//! Read-only status views.

use serde::Serialize;

use crate::health::{HealthRecord, RECENT_HEALTH_RECORDS};
use crate::manager::registry::ServiceEntry;
use crate::pool::PoolStats;
use crate::resilience::{CircuitSnapshot, CircuitState};

/// Cache activity for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Observable state of one registered service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub base_url: Option<String>,
    pub circuit_state: CircuitState,
    pub circuit: CircuitSnapshot,
    pub available_tokens: f64,
    pub rate_capacity: f64,
    pub cache: ServiceCacheStats,
    pub pool: PoolStats,
    /// Most recent health records, oldest first.
    pub health: Vec<HealthRecord>,
}

impl ServiceStatus {
    pub(crate) fn from_entry(entry: &ServiceEntry, cache_entries: usize) -> Self {
        let circuit = entry.circuit.snapshot();
        let (hits, misses) = entry.cache_lookups();
        let lookups = hits + misses;

        Self {
            name: entry.name().to_string(),
            base_url: entry.service.base_url().map(str::to_string),
            circuit_state: circuit.state,
            circuit,
            available_tokens: entry.limiter.available_tokens(),
            rate_capacity: entry.limiter.capacity(),
            cache: ServiceCacheStats {
                entries: cache_entries,
                hits,
                misses,
                hit_rate: if lookups == 0 {
                    0.0
                } else {
                    hits as f64 / lookups as f64
                },
            },
            pool: entry.pool.stats(),
            health: entry.health.recent(RECENT_HEALTH_RECORDS),
        }
    }

    /// Healthy according to the most recent probe, if any.
    pub fn last_known_healthy(&self) -> Option<bool> {
        self.health.last().map(|r| r.healthy)
    }
}
