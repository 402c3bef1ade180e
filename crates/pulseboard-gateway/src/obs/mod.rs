//! Lightweight in-process operational metrics.
//!
//! Counters and gauges are atomics rendered as Prometheus text by
//! `/ops/metrics`. These describe the service itself; the dashboard counters
//! live in `counter::CounterStore`.

pub mod metrics;

pub use metrics::OpsMetrics;
