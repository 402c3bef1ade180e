use axum::extract::ws::Message;

use pulseboard_core::error::Result;
use pulseboard_core::protocol::push::PushMessage;

/// Prepared message cached for broadcasting (serialize once, send N times).
#[derive(Debug, Clone)]
pub struct PreparedMsg {
    text: String,
}

impl PreparedMsg {
    pub fn prepare(msg: &PushMessage) -> Result<Self> {
        Ok(Self { text: msg.to_json()? })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Convert to axum::ws::Message for transport.
    pub fn to_ws_message(&self) -> Message {
        Message::Text(self.text.clone())
    }
}
