use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use pulseboard_core::{CounterState, MetricName};

use crate::counter::CounterStore;
use crate::obs::OpsMetrics;

use super::CounterRepository;

/// Counters to start from, and whether the store is known to hold them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    pub state: CounterState,
    pub in_sync: bool,
}

/// Fetch the persisted record, creating it with zeros if absent.
///
/// Never fails: a read error or timeout logs a warning and yields zeros, so
/// startup does not depend on the store being reachable. In that case
/// `in_sync` is false and the caller must not patch the stored record field
/// by field.
pub async fn load_or_init(repo: &dyn CounterRepository, limit: Duration) -> Loaded {
    let backend = repo.backend();
    let fallback = Loaded {
        state: CounterState::zero(),
        in_sync: false,
    };
    match timeout(limit, repo.load()).await {
        Ok(Ok(Some(state))) => {
            tracing::info!(backend, ?state, "counters loaded from store");
            Loaded {
                state,
                in_sync: true,
            }
        }
        Ok(Ok(None)) => {
            let zero = CounterState::zero();
            let in_sync = match timeout(limit, repo.save_all(&zero)).await {
                Ok(Ok(())) => {
                    tracing::info!(backend, "counter record initialized");
                    true
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend, error = %e, "counter record init failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(backend, "counter record init timed out");
                    false
                }
            };
            Loaded {
                state: zero,
                in_sync,
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(backend, error = %e, "counter load failed, starting from zero");
            fallback
        }
        Err(_) => {
            tracing::warn!(backend, "counter load timed out, starting from zero");
            fallback
        }
    }
}

enum PersistOp {
    Field(MetricName),
    All,
    Flush(oneshot::Sender<()>),
}

/// Handle to the background writer.
///
/// `save`/`save_all` only enqueue and return immediately. The writer reads the
/// value to write from the store at write time, so queued writes can never move
/// the persisted record backwards. A failed or dropped write marks the mirror
/// dirty and the next write is a full-record upsert.
#[derive(Clone)]
pub struct Persistence {
    tx: mpsc::Sender<PersistOp>,
    dirty: Arc<AtomicBool>,
    metrics: Arc<OpsMetrics>,
}

impl Persistence {
    /// Spawn the writer task for `repo`, mirroring `store`.
    pub fn spawn(
        repo: Arc<dyn CounterRepository>,
        store: Arc<CounterStore>,
        metrics: Arc<OpsMetrics>,
        queue_capacity: usize,
        write_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let dirty = Arc::new(AtomicBool::new(false));

        let writer = Writer {
            repo,
            store,
            dirty: Arc::clone(&dirty),
            metrics: Arc::clone(&metrics),
            write_timeout,
        };
        let handle = tokio::spawn(writer.run(rx));

        (Self { tx, dirty, metrics }, handle)
    }

    /// Mirror the current value of `metric`.
    pub fn save(&self, metric: MetricName) {
        self.enqueue(PersistOp::Field(metric), "field");
    }

    /// Mirror the whole current state.
    pub fn save_all(&self) {
        self.enqueue(PersistOp::All, "all");
    }

    /// Make the next write a full-record upsert, whatever it was queued as.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistOp::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Final full-record write, bounded by `limit`.
    pub async fn shutdown(&self, limit: Duration) {
        let drained = timeout(limit, async {
            if self.tx.send(PersistOp::All).await.is_ok() {
                self.flush().await;
            }
        })
        .await;
        match drained {
            Ok(()) => tracing::info!("counters flushed to store"),
            Err(_) => tracing::warn!("shutdown flush timed out; store may lag memory"),
        }
    }

    fn enqueue(&self, op: PersistOp, kind: &'static str) {
        if let Err(e) = self.tx.try_send(op) {
            self.dirty.store(true, Ordering::SeqCst);
            self.metrics
                .persist_writes
                .inc(&[("kind", kind), ("result", "dropped")]);
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(kind, "persist queue full, write deferred to next full sync")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::warn!(kind, "persist writer stopped, write dropped")
                }
            }
        }
    }
}

struct Writer {
    repo: Arc<dyn CounterRepository>,
    store: Arc<CounterStore>,
    dirty: Arc<AtomicBool>,
    metrics: Arc<OpsMetrics>,
    write_timeout: Duration,
}

impl Writer {
    async fn run(self, mut rx: mpsc::Receiver<PersistOp>) {
        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Flush(done) => {
                    let _ = done.send(());
                }
                PersistOp::Field(metric) if !self.dirty.load(Ordering::SeqCst) => {
                    let value = self.store.snapshot().get(metric);
                    let res = timeout(self.write_timeout, self.repo.save_field(metric, value)).await;
                    self.record("field", res);
                }
                PersistOp::Field(_) | PersistOp::All => {
                    // Clear before snapshotting so a drop that races this
                    // write re-marks the mirror.
                    self.dirty.store(false, Ordering::SeqCst);
                    let state = self.store.snapshot();
                    let res = timeout(self.write_timeout, self.repo.save_all(&state)).await;
                    self.record("all", res);
                }
            }
        }
        tracing::debug!("persist writer stopped");
    }

    fn record(
        &self,
        kind: &'static str,
        res: std::result::Result<pulseboard_core::Result<()>, tokio::time::error::Elapsed>,
    ) {
        let backend = self.repo.backend();
        let result = match res {
            Ok(Ok(())) => "ok",
            Ok(Err(e)) => {
                tracing::warn!(backend, kind, error = %e, "persist write failed");
                "error"
            }
            Err(_) => {
                tracing::warn!(backend, kind, "persist write timed out");
                "timeout"
            }
        };
        if result != "ok" {
            self.dirty.store(true, Ordering::SeqCst);
        }
        self.metrics
            .persist_writes
            .inc(&[("kind", kind), ("result", result)]);
    }
}
