//! Minimal metrics registry for the gateway.
//!
//! Counter and gauge types with dynamic labels backed by `DashMap`. Labels are
//! flattened into sorted key vectors to keep deterministic ordering.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut key: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_line(out: &mut String, name: &str, key: &[(String, String)], val: impl std::fmt::Display) {
    if key.is_empty() {
        let _ = writeln!(out, "{} {}", name, val);
        return;
    }
    let label_str = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<(String, String)>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            render_line(out, name, r.key(), r.value().load(Ordering::Relaxed));
        }
    }
}

#[derive(Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        render_line(out, name, &[], self.get());
    }
}

#[derive(Default)]
pub struct OpsMetrics {
    /// `result` = ok | missing | invalid | internal
    pub signals: CounterVec,
    pub resets: CounterVec,
    pub subscribers_active: Gauge,
    pub subscriber_connects: CounterVec,
    /// `reason` = full | closed
    pub broadcast_evictions: CounterVec,
    /// `kind` = field | all, `result` = ok | error | timeout
    pub persist_writes: CounterVec,
    draining: AtomicBool,
}

impl OpsMetrics {
    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    /// Return whether draining is active.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all registered metrics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.signals.render("pulseboard_signals_total", &mut out);
        self.resets.render("pulseboard_resets_total", &mut out);
        self.subscribers_active
            .render("pulseboard_subscribers_active", &mut out);
        self.subscriber_connects
            .render("pulseboard_subscriber_connects_total", &mut out);
        self.broadcast_evictions
            .render("pulseboard_broadcast_evictions_total", &mut out);
        self.persist_writes
            .render("pulseboard_persist_writes_total", &mut out);
        let _ = writeln!(
            out,
            "# TYPE pulseboard_draining gauge\npulseboard_draining {}",
            if self.is_draining() { 1 } else { 0 }
        );
        out
    }
}
