//! Metric names and counter state.
//!
//! The set of metrics is closed: `MetricName` is an enum and `CounterState`
//! has exactly one typed field per variant. Parsing an unknown name fails, it
//! never allocates a new counter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};

/// One of the fixed dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    Paircode,
    Api,
    Bot,
    Cdn,
}

impl MetricName {
    /// Every metric, in wire order.
    pub const ALL: [MetricName; 4] = [
        MetricName::Paircode,
        MetricName::Api,
        MetricName::Bot,
        MetricName::Cdn,
    ];

    /// Wire name, also used as the persisted column name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Paircode => "paircode",
            MetricName::Api => "api",
            MetricName::Bot => "bot",
            MetricName::Cdn => "cdn",
        }
    }

    /// Parse a signal's `type` field.
    ///
    /// Empty input is `MissingMetric`, anything outside the set is
    /// `InvalidMetric`. Matching is exact (case-sensitive).
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(PulseError::MissingMetric);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PulseError::InvalidMetric(s.to_string()))
    }
}

impl FromStr for MetricName {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current value of every counter.
///
/// Serializes as a flat object (`{"paircode":0,"api":0,"bot":0,"cdn":0}`).
/// Deserializing tolerates missing fields (they become 0) and ignores extra
/// ones, so a stored document's bookkeeping fields never reach memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterState {
    pub paircode: u64,
    pub api: u64,
    pub bot: u64,
    pub cdn: u64,
}

impl CounterState {
    /// All-zero state.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: MetricName) -> u64 {
        match metric {
            MetricName::Paircode => self.paircode,
            MetricName::Api => self.api,
            MetricName::Bot => self.bot,
            MetricName::Cdn => self.cdn,
        }
    }

    pub fn set(&mut self, metric: MetricName, value: u64) {
        *self.slot(metric) = value;
    }

    /// Add one to `metric` and return the new value.
    ///
    /// Overflow leaves the state untouched and returns an error.
    pub fn increment(&mut self, metric: MetricName) -> Result<u64> {
        let slot = self.slot(metric);
        let next = slot
            .checked_add(1)
            .ok_or_else(|| PulseError::Internal(format!("counter overflow: {metric}")))?;
        *slot = next;
        Ok(next)
    }

    /// `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (MetricName, u64)> + '_ {
        MetricName::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    fn slot(&mut self, metric: MetricName) -> &mut u64 {
        match metric {
            MetricName::Paircode => &mut self.paircode,
            MetricName::Api => &mut self.api,
            MetricName::Bot => &mut self.bot,
            MetricName::Cdn => &mut self.cdn,
        }
    }
}
