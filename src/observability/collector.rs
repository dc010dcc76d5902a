//! Metric event sink and in-process aggregation.
//!
//! # Responsibilities
//! - Accept every `MetricEvent` through a single append-style sink
//! - Aggregate per (service, operation): outcomes, attempts, latency
//! - Keep a bounded ring of recent events for the admin API
//! - Forward events to the `metrics` facade for Prometheus export

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::observability::events::{EventSource, MetricEvent, Outcome};
use crate::observability::metrics;

/// Append-only destination for metric events.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _event: MetricEvent) {}
}

/// Aggregates for one (service, operation) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationStats {
    pub service: String,
    pub operation: String,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
    /// Successes served from the cache (included in `successes`).
    pub cache_hits: u64,
    pub total_attempts: u64,
    pub total_latency: Duration,
    pub max_latency: Duration,
    /// Failures and rejections by kind.
    pub by_kind: BTreeMap<String, u64>,
}

impl OperationStats {
    pub fn calls(&self) -> u64 {
        self.successes + self.failures + self.rejections
    }

    pub fn average_latency(&self) -> Duration {
        let calls = u32::try_from(self.calls()).unwrap_or(u32::MAX);
        if calls == 0 {
            Duration::ZERO
        } else {
            self.total_latency / calls
        }
    }

    fn apply(&mut self, event: &MetricEvent) {
        match event.outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Failure => self.failures += 1,
            Outcome::Rejected => self.rejections += 1,
        }
        if event.source == EventSource::Cache {
            self.cache_hits += 1;
        }
        if let Some(kind) = event.kind {
            *self.by_kind.entry(kind.as_str().to_string()).or_default() += 1;
        }
        self.total_attempts += u64::from(event.attempts);
        self.total_latency += event.latency;
        self.max_latency = self.max_latency.max(event.latency);
    }
}

/// Serializable view of everything the collector holds.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub operations: Vec<OperationStats>,
    pub recent: Vec<MetricEvent>,
}

#[derive(Debug, Default)]
struct CollectorState {
    total_events: u64,
    operations: HashMap<(String, String), OperationStats>,
    recent: VecDeque<MetricEvent>,
}

/// Default sink: aggregates in memory and forwards to the `metrics` facade.
#[derive(Debug)]
pub struct MetricsCollector {
    recent_capacity: usize,
    state: Mutex<CollectorState>,
}

impl MetricsCollector {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            recent_capacity,
            state: Mutex::new(CollectorState::default()),
        }
    }

    pub fn stats_for(&self, service: &str, operation: &str) -> Option<OperationStats> {
        self.state
            .lock()
            .operations
            .get(&(service.to_string(), operation.to_string()))
            .cloned()
    }

    /// Aggregates for every operation of `service`.
    pub fn service_stats(&self, service: &str) -> Vec<OperationStats> {
        let state = self.state.lock();
        let mut stats: Vec<_> = state
            .operations
            .values()
            .filter(|s| s.service == service)
            .cloned()
            .collect();
        stats.sort_by(|a, b| a.operation.cmp(&b.operation));
        stats
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        let mut operations: Vec<_> = state.operations.values().cloned().collect();
        operations.sort_by(|a, b| (&a.service, &a.operation).cmp(&(&b.service, &b.operation)));
        MetricsSnapshot {
            total_events: state.total_events,
            operations,
            recent: state.recent.iter().cloned().collect(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: MetricEvent) {
        metrics::record_event(&event);

        let mut state = self.state.lock();
        state.total_events += 1;
        state
            .operations
            .entry((event.service.clone(), event.operation.clone()))
            .or_insert_with(|| OperationStats {
                service: event.service.clone(),
                operation: event.operation.clone(),
                ..OperationStats::default()
            })
            .apply(&event);

        if self.recent_capacity > 0 {
            if state.recent.len() >= self.recent_capacity {
                state.recent.pop_front();
            }
            state.recent.push_back(event);
        }
    }
}
