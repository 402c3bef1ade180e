//! pulseboard gateway library entry.
//!
//! Wires the counter store, persistence mirror, broadcaster and HTTP/WS
//! transport into one service. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod counter;
pub mod http;
pub mod ingest;
pub mod obs;
pub mod ops;
pub mod persist;
pub mod realtime;
pub mod router;
pub mod transport;
