//! Authoritative in-memory counters.

mod store;

pub use store::CounterStore;
