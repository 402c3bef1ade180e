//! Signal ingestion: validate, mutate, broadcast, persist.

mod service;

pub use service::SignalService;
