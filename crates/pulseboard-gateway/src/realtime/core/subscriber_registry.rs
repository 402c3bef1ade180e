use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::realtime::types::PreparedMsg;

/// Process-unique subscriber handle.
pub type SubscriberId = u64;

/// Subscriber lifecycle: `Connecting -> Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Upgraded, INIT not yet queued, not in the registry.
    Connecting,
    /// In the registry, receives broadcasts.
    Open,
    /// Removed; never receives anything again.
    Closed,
}

/// One subscriber's outbound queue sender.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// Queue full: the client is not reading fast enough.
    Full,
    /// Receiver gone: the session already ended.
    Closed,
}

impl EvictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictReason::Full => "full",
            EvictReason::Closed => "closed",
        }
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Default)]
pub struct FanOut {
    pub delivered: usize,
    pub evicted: Vec<(SubscriberId, EvictReason)>,
}

/// Subscriber registry: `subscriber_id -> Connection`.
///
/// Broadcast cost is O(subscribers) per message, sized for dashboards with at
/// most a few thousand viewers.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Connection>,
    seq: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> SubscriberId {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, id: SubscriberId, conn: Connection) {
        self.subscribers.insert(id, conn);
    }

    pub fn remove(&self, id: SubscriberId) -> Option<Connection> {
        self.subscribers.remove(&id).map(|(_, conn)| conn)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Enqueue `msg` to every subscriber without waiting.
    ///
    /// Subscribers whose queue is full or closed are removed after the scan
    /// (removing while iterating would deadlock on the shard lock).
    pub fn fan_out(&self, msg: &PreparedMsg) -> FanOut {
        let mut out = FanOut::default();
        for entry in self.subscribers.iter() {
            match entry.value().tx.try_send(msg.to_ws_message()) {
                Ok(()) => out.delivered += 1,
                Err(TrySendError::Full(_)) => out.evicted.push((*entry.key(), EvictReason::Full)),
                Err(TrySendError::Closed(_)) => {
                    out.evicted.push((*entry.key(), EvictReason::Closed))
                }
            }
        }
        for (id, _) in &out.evicted {
            self.subscribers.remove(id);
        }
        out
    }
}
