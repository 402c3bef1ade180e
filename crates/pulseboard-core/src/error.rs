//! Shared error type across pulseboard crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Signal carried no metric name.
    MissingMetric,
    /// Signal named a metric outside the fixed set.
    InvalidMetric,
    /// Malformed input (config, request shape).
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Durable store unreachable or rejected a write.
    Unavailable,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in logs and ops output.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::MissingMetric => "MISSING_METRIC",
            ClientCode::InvalidMetric => "INVALID_METRIC",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("metric type is required")]
    MissingMetric,
    #[error("invalid metric type: {0}")]
    InvalidMetric(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PulseError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            PulseError::MissingMetric => ClientCode::MissingMetric,
            PulseError::InvalidMetric(_) => ClientCode::InvalidMetric,
            PulseError::BadRequest(_) => ClientCode::BadRequest,
            PulseError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            PulseError::Persistence(_) => ClientCode::Unavailable,
            PulseError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Message exposed to HTTP callers. Internal details never leak.
    pub fn public_message(&self) -> &'static str {
        match self.client_code() {
            ClientCode::MissingMetric => "Type is required",
            ClientCode::InvalidMetric => "Invalid metric type",
            ClientCode::BadRequest => "Bad request",
            ClientCode::UnsupportedVersion => "Unsupported version",
            ClientCode::Unavailable | ClientCode::Internal => "Internal server error",
        }
    }

    /// True for caller mistakes (4xx); false for server-side failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PulseError::MissingMetric | PulseError::InvalidMetric(_) | PulseError::BadRequest(_)
        )
    }
}
