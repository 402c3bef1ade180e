// HTTP mapping for `PulseError` (non-WS handlers).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use pulseboard_core::protocol::signal::Failure;
use pulseboard_core::PulseError;

/// Wrapper so handlers can `?` a `PulseError` into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub PulseError);

impl From<PulseError> for ApiError {
    fn from(e: PulseError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(Failure::from_error(&self.0))).into_response()
    }
}
