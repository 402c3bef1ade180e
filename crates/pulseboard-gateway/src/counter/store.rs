use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pulseboard_core::error::Result;
use pulseboard_core::{CounterState, MetricName};

/// Single owner of the live counter values.
///
/// Mutations take the write lock, snapshots take the read lock and copy out,
/// so readers never see a half-applied change and never hold a reference to
/// live state.
///
/// The `*_observed` variants run a hook while the lock is still held. The
/// hook must not block or await: it exists so callers can enqueue events in
/// exactly the order mutations were applied.
#[derive(Debug, Default)]
pub struct CounterStore {
    state: RwLock<CounterState>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(initial: CounterState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Replace the whole state. Called once at startup before serving.
    pub fn load(&self, initial: CounterState) {
        *self.write() = initial;
    }

    pub fn snapshot(&self) -> CounterState {
        *self.read()
    }

    /// Copy the state and run `observe` on it before any mutation can land.
    pub fn snapshot_observed<R>(&self, observe: impl FnOnce(&CounterState) -> R) -> R {
        let guard = self.read();
        observe(&guard)
    }

    /// Parse `name` and add one to it.
    pub fn increment(&self, name: &str) -> Result<u64> {
        let metric = MetricName::parse(name)?;
        self.increment_observed(metric, |_, _| {})
    }

    /// Add one to `metric`, then call `observe(metric, new_value)` under the
    /// write lock. On error nothing changes and `observe` is not called.
    pub fn increment_observed(
        &self,
        metric: MetricName,
        observe: impl FnOnce(MetricName, u64),
    ) -> Result<u64> {
        let mut guard = self.write();
        let value = guard.increment(metric)?;
        observe(metric, value);
        Ok(value)
    }

    /// Zero every counter and return the zero snapshot.
    pub fn reset(&self) -> CounterState {
        self.reset_observed(|_| {})
    }

    pub fn reset_observed(&self, observe: impl FnOnce(&CounterState)) -> CounterState {
        let mut guard = self.write();
        *guard = CounterState::zero();
        observe(&guard);
        *guard
    }

    // A panic while holding the lock happens after the single-field write has
    // either completed or not started, so the inner value is always whole.
    fn read(&self) -> RwLockReadGuard<'_, CounterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CounterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
