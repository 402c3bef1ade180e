use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use pulseboard_core::error::{Result, PulseError};
use pulseboard_core::protocol::push::PushMessage;
use pulseboard_core::{CounterState, MetricName};

use crate::counter::CounterStore;
use crate::obs::OpsMetrics;
use crate::persist::Persistence;
use crate::realtime::Broadcaster;

/// Applies signals and resets against the store.
///
/// Order per mutation: store write and broadcast enqueue happen together under
/// the store lock; the persistence write is enqueued after the lock is
/// released and never awaited here.
pub struct SignalService {
    store: Arc<CounterStore>,
    broadcaster: Arc<Broadcaster>,
    persistence: Persistence,
    metrics: Arc<OpsMetrics>,
}

impl SignalService {
    pub fn new(
        store: Arc<CounterStore>,
        broadcaster: Arc<Broadcaster>,
        persistence: Persistence,
        metrics: Arc<OpsMetrics>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            persistence,
            metrics,
        }
    }

    /// Increment the metric named `name`; returns the new count.
    pub fn signal(&self, name: &str) -> Result<u64> {
        self.signal_metric(MetricName::parse(name))
    }

    /// Increment an already-resolved metric. Validation errors are counted
    /// here so every rejected signal shows up in ops metrics.
    pub fn signal_metric(&self, metric: Result<MetricName>) -> Result<u64> {
        let res = metric.and_then(|m| {
            self.mutate(|| {
                self.store.increment_observed(m, |m, v| {
                    self.broadcaster.publish(&PushMessage::update(m, v))
                })
            })
            .map(|value| (m, value))
        });

        match res {
            Ok((metric, value)) => {
                self.persistence.save(metric);
                self.metrics.signals.inc(&[("result", "ok")]);
                tracing::debug!(%metric, value, "signal applied");
                Ok(value)
            }
            Err(e) => {
                let result = match &e {
                    PulseError::MissingMetric => "missing",
                    PulseError::InvalidMetric(_) => "invalid",
                    _ => "internal",
                };
                if result == "internal" {
                    tracing::error!(error = %e, "signal failed");
                } else {
                    tracing::debug!(error = %e, "signal rejected");
                }
                self.metrics.signals.inc(&[("result", result)]);
                Err(e)
            }
        }
    }

    /// Zero every counter, push INIT to all subscribers, persist.
    pub fn reset(&self) -> Result<CounterState> {
        let state = self.mutate(|| {
            Ok(self
                .store
                .reset_observed(|s| self.broadcaster.publish(&PushMessage::init(*s))))
        })?;
        self.persistence.save_all();
        self.metrics.resets.inc(&[]);
        tracing::info!(subscribers = self.broadcaster.registry().len(), "counters reset");
        Ok(state)
    }

    pub fn snapshot(&self) -> CounterState {
        self.store.snapshot()
    }

    /// Run a store mutation under `guarded`. A panic may land after the store
    /// changed, so it schedules a full-record sync before reporting.
    fn mutate<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let res = guarded(f);
        if let Err(PulseError::Internal(_)) = &res {
            self.persistence.save_all();
        }
        res
    }
}

/// Run `f`, turning a panic into `PulseError::Internal`.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(PulseError::Internal(format!("panic during mutation: {msg}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::InMemoryCounterRepository;
    use axum::extract::ws::Message;
    use tokio::time::Duration;

    struct Fixture {
        svc: SignalService,
        broadcaster: Arc<Broadcaster>,
        repo: Arc<InMemoryCounterRepository>,
        persistence: Persistence,
        metrics: Arc<OpsMetrics>,
    }

    fn fixture(initial: CounterState) -> Fixture {
        let store = Arc::new(CounterStore::with_state(initial));
        let metrics = Arc::new(OpsMetrics::default());
        let repo = Arc::new(InMemoryCounterRepository::with_record(initial));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&store), Arc::clone(&metrics), 64));
        let (persistence, _h) = Persistence::spawn(
            repo.clone(),
            Arc::clone(&store),
            Arc::clone(&metrics),
            64,
            Duration::from_millis(500),
        );
        let svc = SignalService::new(
            store,
            Arc::clone(&broadcaster),
            persistence.clone(),
            Arc::clone(&metrics),
        );
        Fixture {
            svc,
            broadcaster,
            repo,
            persistence,
            metrics,
        }
    }

    fn push(msg: Message) -> PushMessage {
        match msg {
            Message::Text(s) => serde_json::from_str(&s).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn signal_increments_broadcasts_and_persists() {
        let f = fixture(CounterState::zero());
        let mut sub = f.broadcaster.subscribe().unwrap();
        let _init = sub.try_recv();

        for expected in 1..=3 {
            assert_eq!(f.svc.signal("paircode").unwrap(), expected);
            assert_eq!(
                push(sub.try_recv().unwrap()),
                PushMessage::update(MetricName::Paircode, expected)
            );
        }

        f.persistence.flush().await;
        assert_eq!(f.repo.record().await, Some(f.svc.snapshot()));
        assert_eq!(f.metrics.signals.get(&[("result", "ok")]), 3);
    }

    #[tokio::test]
    async fn rejected_signal_changes_nothing() {
        let f = fixture(CounterState {
            bot: 5,
            ..CounterState::zero()
        });
        let mut sub = f.broadcaster.subscribe().unwrap();
        let _init = sub.try_recv();
        let before = f.svc.snapshot();

        assert!(matches!(
            f.svc.signal("nonexistent"),
            Err(PulseError::InvalidMetric(_))
        ));
        assert!(matches!(f.svc.signal(""), Err(PulseError::MissingMetric)));

        assert_eq!(f.svc.snapshot(), before);
        assert!(sub.try_recv().is_none());
        assert_eq!(f.metrics.signals.get(&[("result", "invalid")]), 1);
        assert_eq!(f.metrics.signals.get(&[("result", "missing")]), 1);
    }

    #[tokio::test]
    async fn outage_does_not_fail_signals() {
        let f = fixture(CounterState::zero());
        let mut sub = f.broadcaster.subscribe().unwrap();
        let _init = sub.try_recv();

        f.repo.set_available(false);
        assert_eq!(f.svc.signal("api").unwrap(), 1);
        assert_eq!(f.svc.signal("api").unwrap(), 2);
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_some());
        f.persistence.flush().await;
        assert_eq!(f.repo.record().await, Some(CounterState::zero()));

        f.repo.set_available(true);
        assert_eq!(f.svc.signal("api").unwrap(), 3);
        f.persistence.flush().await;
        assert_eq!(f.repo.record().await, Some(f.svc.snapshot()));
    }

    #[tokio::test]
    async fn reset_pushes_init_and_persists_zero() {
        let f = fixture(CounterState {
            paircode: 10,
            api: 2,
            bot: 0,
            cdn: 7,
        });
        let mut sub = f.broadcaster.subscribe().unwrap();
        let _init = sub.try_recv();

        assert_eq!(f.svc.reset().unwrap(), CounterState::zero());
        assert_eq!(
            push(sub.try_recv().unwrap()),
            PushMessage::init(CounterState::zero())
        );
        f.persistence.flush().await;
        assert_eq!(f.repo.record().await, Some(CounterState::zero()));
    }

    #[tokio::test]
    async fn panic_after_mutation_still_reaches_the_store() {
        let f = fixture(CounterState::zero());

        let res = f.svc.mutate(|| {
            f.svc
                .store
                .increment_observed(MetricName::Cdn, |_, _| panic!("observer failed"))
        });
        assert!(matches!(res, Err(PulseError::Internal(_))));
        assert_eq!(f.svc.snapshot().cdn, 1);

        f.persistence.flush().await;
        assert_eq!(f.repo.record().await, Some(f.svc.snapshot()));
    }

    #[test]
    fn guarded_turns_panics_into_internal_errors() {
        let res: Result<u64> = guarded(|| panic!("boom"));
        match res {
            Err(PulseError::Internal(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
