//! Live channel messages.
//!
//! Subscribers never send anything meaningful; the server pushes:
//! - `{"type":"INIT","data":{...}}` on connect and after a reset,
//! - `{"type":"UPDATE","metric":"api","value":7}` after each increment.

use serde::{Deserialize, Serialize};

use crate::error::{PulseError, Result};
use crate::metric::{CounterState, MetricName};

/// Server push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushMessage {
    /// Full state. Clients replace whatever they hold.
    #[serde(rename = "INIT")]
    Init { data: CounterState },
    /// Single counter changed to `value`.
    #[serde(rename = "UPDATE")]
    Update { metric: MetricName, value: u64 },
}

impl PushMessage {
    pub fn init(state: CounterState) -> Self {
        PushMessage::Init { data: state }
    }

    pub fn update(metric: MetricName, value: u64) -> Self {
        PushMessage::Update { metric, value }
    }

    /// Serialize once; the broadcaster clones the text per subscriber.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PulseError::Internal(format!("push encode failed: {e}")))
    }
}
