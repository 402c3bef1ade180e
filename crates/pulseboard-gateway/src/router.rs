//! Axum router wiring.
//!
//! The live channel is served on `/ws` and, for clients that connect to the
//! bare host, on `/`.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, http, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/signal", post(http::signal))
        .route("/metrics", get(http::metrics))
        .route("/reset", post(http::reset))
        .route("/ws", get(transport::ws::ws_upgrade))
        .route("/", get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/ops/metrics", get(ops::metrics))
        .with_state(state)
}
