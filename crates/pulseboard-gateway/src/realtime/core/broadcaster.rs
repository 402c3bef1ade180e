use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use pulseboard_core::error::{Result, PulseError};
use pulseboard_core::protocol::push::PushMessage;

use crate::counter::CounterStore;
use crate::obs::OpsMetrics;
use crate::realtime::core::{Connection, SubscriberId, SubscriberRegistry, SubscriberState};
use crate::realtime::types::PreparedMsg;

/// Broadcaster: subscribe with a consistent INIT, publish in store order.
///
/// Ordering contract: `publish` is called from inside the store's mutation
/// hook and `subscribe` takes its INIT snapshot under the store's read lock.
/// A subscriber therefore sees INIT(state at time T) followed by exactly the
/// mutations applied after T, in the order they were applied.
pub struct Broadcaster {
    store: Arc<CounterStore>,
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<OpsMetrics>,
    queue: usize,
}

impl Broadcaster {
    pub fn new(store: Arc<CounterStore>, metrics: Arc<OpsMetrics>, queue: usize) -> Self {
        Self {
            store,
            registry: Arc::new(SubscriberRegistry::new()),
            metrics,
            queue: queue.max(1),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Open a subscription. The INIT message is already queued when this
    /// returns.
    pub fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.queue);
        let mut sub = Subscription {
            id: self.registry.next_id(),
            state: SubscriberState::Connecting,
            rx,
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
        };

        self.store.snapshot_observed(|state| -> Result<()> {
            let init = PreparedMsg::prepare(&PushMessage::init(*state))?;
            tx.try_send(init.to_ws_message())
                .map_err(|_| PulseError::Internal("subscriber queue rejected INIT".into()))?;
            self.registry.insert(sub.id, Connection { tx });
            Ok(())
        })?;

        sub.state = SubscriberState::Open;
        self.metrics.subscribers_active.inc();
        self.metrics.subscriber_connects.inc(&[]);
        Ok(sub)
    }

    /// Enqueue `msg` to every open subscriber.
    ///
    /// Must not block: it runs while the store lock is held.
    pub fn publish(&self, msg: &PushMessage) {
        let prepared = match PreparedMsg::prepare(msg) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "push message encode failed");
                return;
            }
        };
        let out = self.registry.fan_out(&prepared);
        for (id, reason) in out.evicted {
            tracing::debug!(subscriber = id, reason = reason.as_str(), "subscriber evicted");
            self.metrics
                .broadcast_evictions
                .inc(&[("reason", reason.as_str())]);
        }
    }
}

/// Receiving side of one subscriber. Dropping it closes the subscription.
pub struct Subscription {
    id: SubscriberId,
    state: SubscriberState,
    rx: mpsc::Receiver<Message>,
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<OpsMetrics>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    /// Next queued message; `None` once the subscriber was evicted and its
    /// queue drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        if self.state == SubscriberState::Closed {
            return;
        }
        if self.state == SubscriberState::Open {
            self.metrics.subscribers_active.dec();
        }
        self.registry.remove(self.id);
        self.rx.close();
        self.state = SubscriberState::Closed;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
