//! HTTP endpoints for producers and polling consumers.
//!
//! - `POST /signal` : increment one counter
//! - `GET /metrics` : current counters as a flat object
//! - `POST /reset`  : zero everything and re-sync subscribers

pub mod error;
pub mod handlers;

pub use error::ApiError;
pub use handlers::{metrics, reset, signal};
