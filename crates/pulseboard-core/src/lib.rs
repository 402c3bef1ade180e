//! pulseboard core: metric model, wire messages, and the shared error type.
//!
//! This crate defines the contracts shared by the gateway and any client
//! tooling. It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `PulseError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metric;
pub mod protocol;

/// Shared result type.
pub use error::{Result, PulseError};
pub use metric::{CounterState, MetricName};
