//! Wire formats.
//!
//! - `push`: server -> dashboard messages on the live channel (INIT / UPDATE).
//! - `signal`: HTTP request/response bodies for signal, query and reset.
//!
//! Everything here is plain serde data; the gateway owns transport concerns.

pub mod push;
pub mod signal;
