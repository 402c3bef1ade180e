use async_trait::async_trait;

use pulseboard_core::error::Result;
use pulseboard_core::{CounterState, MetricName};

/// Storage for the single persisted counter record.
///
/// Implementations upsert in place: there is exactly one logical record and
/// it is never duplicated or versioned.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Fetch the record, `None` if it was never written.
    async fn load(&self) -> Result<Option<CounterState>>;

    /// Upsert one field, creating the record with zeros if needed.
    async fn save_field(&self, metric: MetricName, value: u64) -> Result<()>;

    /// Upsert every field.
    async fn save_all(&self, state: &CounterState) -> Result<()>;
}
