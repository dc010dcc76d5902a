//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! FailoverManager::execute
//!     → events.rs (one MetricEvent per call, cache hits and rejections included)
//!     → collector.rs (MetricsSink: in-memory aggregates + recent ring)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! All subsystems:
//!     → logging.rs (structured log events, request_id span per call)
//! ```
//!
//! # Design Decisions
//! - The core only emits events; export format is the sink's concern
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)

pub mod collector;
pub mod events;
pub mod logging;
pub mod metrics;

pub use collector::{MetricsCollector, MetricsSink, MetricsSnapshot, NoopSink, OperationStats};
pub use events::{EventSource, MetricEvent, Outcome};
