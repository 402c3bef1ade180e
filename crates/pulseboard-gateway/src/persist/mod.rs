//! Durable mirror of the counter store.
//!
//! The store in memory is the source of truth while the process runs; this
//! layer exists so a restart resumes from the last written values.
//!
//! Writes are fire-and-forget on purpose: the request path only enqueues,
//! a single writer task applies writes in order with a timeout each, and
//! failures are logged and counted but never returned to the signal caller.
//! Persisting before responding would make dashboard latency depend on the
//! store; that variant is not offered.

mod adapter;
mod memory;
mod repository;
mod sqlite;

pub use adapter::{load_or_init, Loaded, Persistence};
pub use memory::InMemoryCounterRepository;
pub use repository::CounterRepository;
pub use sqlite::SqliteCounterRepository;
