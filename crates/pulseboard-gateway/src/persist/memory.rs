use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use pulseboard_core::error::{Result, PulseError};
use pulseboard_core::{CounterState, MetricName};

use super::CounterRepository;

/// Process-local repository.
///
/// Useful when durability is not wanted and in tests, where
/// `set_available(false)` simulates a store outage.
pub struct InMemoryCounterRepository {
    record: RwLock<Option<CounterState>>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryCounterRepository {
    pub fn new() -> Self {
        Self {
            record: RwLock::new(None),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Start with an existing record, as if written by a previous run.
    pub fn with_record(state: CounterState) -> Self {
        Self {
            record: RwLock::new(Some(state)),
            ..Self::new()
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current stored record.
    pub async fn record(&self) -> Option<CounterState> {
        *self.record.read().await
    }

    /// Number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PulseError::Persistence("in-memory store unavailable".into()))
        }
    }
}

impl Default for InMemoryCounterRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterRepository for InMemoryCounterRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Option<CounterState>> {
        self.check_available()?;
        Ok(*self.record.read().await)
    }

    async fn save_field(&self, metric: MetricName, value: u64) -> Result<()> {
        self.check_available()?;
        let mut record = self.record.write().await;
        record.get_or_insert_with(CounterState::zero).set(metric, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_all(&self, state: &CounterState) -> Result<()> {
        self.check_available()?;
        *self.record.write().await = Some(*state);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
