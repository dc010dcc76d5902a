//! Per-service health history.
//!
//! # Design Decisions
//! - Bounded ring: the oldest record is dropped once `capacity` is reached
//! - Informational only; admission is decided by the circuit breaker
//! - Records carry wall-clock timestamps for display

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;

/// Records shown in status views.
pub const RECENT_HEALTH_RECORDS: usize = 10;

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub healthy: bool,
    pub latency: Duration,
    pub checked_at: SystemTime,
}

impl HealthRecord {
    pub fn new(healthy: bool, latency: Duration) -> Self {
        Self {
            healthy,
            latency,
            checked_at: SystemTime::now(),
        }
    }
}

#[derive(Debug)]
pub struct HealthHistory {
    capacity: usize,
    records: Mutex<VecDeque<HealthRecord>>,
}

impl HealthHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, record: HealthRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HealthRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<HealthRecord> {
        self.records.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
