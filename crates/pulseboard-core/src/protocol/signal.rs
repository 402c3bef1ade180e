//! HTTP bodies for `/signal`, `/metrics` and `/reset`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PulseError, Result};
use crate::metric::{CounterState, MetricName};

/// `POST /signal` body.
///
/// `type` is kept as a raw JSON value so a number or object is reported as an
/// invalid metric rather than a body parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct SignalRequest {
    #[serde(rename = "type", default)]
    pub metric: Option<Value>,
}

impl SignalRequest {
    /// Resolve the requested metric.
    pub fn metric(&self) -> Result<MetricName> {
        match &self.metric {
            None | Some(Value::Null) => Err(PulseError::MissingMetric),
            Some(Value::String(s)) => MetricName::parse(s),
            Some(other) => Err(PulseError::InvalidMetric(other.to_string())),
        }
    }
}

/// `200` body of `POST /signal`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalAccepted {
    pub success: bool,
    pub new_count: u64,
}

impl SignalAccepted {
    pub fn new(new_count: u64) -> Self {
        Self {
            success: true,
            new_count,
        }
    }
}

/// `200` body of `POST /reset`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetAccepted {
    pub success: bool,
    pub message: String,
    pub metrics: CounterState,
}

impl ResetAccepted {
    pub fn new(metrics: CounterState) -> Self {
        Self {
            success: true,
            message: "Metrics reset".to_string(),
            metrics,
        }
    }
}

/// Error body shared by all endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl Failure {
    pub fn from_error(err: &PulseError) -> Self {
        Self {
            success: false,
            error: err.public_message().to_string(),
        }
    }
}
