use axum::{extract::rejection::JsonRejection, extract::State, Json};

use pulseboard_core::protocol::signal::{ResetAccepted, SignalAccepted, SignalRequest};
use pulseboard_core::{CounterState, PulseError};

use crate::app_state::AppState;
use crate::http::ApiError;

pub async fn signal(
    State(app): State<AppState>,
    body: Result<Json<SignalRequest>, JsonRejection>,
) -> Result<Json<SignalAccepted>, ApiError> {
    // An unreadable body carries no type, same as `{}`.
    let metric = match body {
        Ok(Json(req)) => req.metric(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "signal body rejected");
            Err(PulseError::MissingMetric)
        }
    };
    let value = app.signals().signal_metric(metric)?;
    Ok(Json(SignalAccepted::new(value)))
}

pub async fn metrics(State(app): State<AppState>) -> Json<CounterState> {
    Json(app.signals().snapshot())
}

pub async fn reset(State(app): State<AppState>) -> Result<Json<ResetAccepted>, ApiError> {
    let state = app.signals().reset()?;
    Ok(Json(ResetAccepted::new(state)))
}
