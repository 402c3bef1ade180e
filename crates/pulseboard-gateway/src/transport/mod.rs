//! Transport layer (WebSocket).
//!
//! Exposes the live subscription endpoint: upgrade, INIT, then pushes until
//! the client goes away.

pub mod ws;
