//! Shared application state for the pulseboard gateway.
//!
//! Owns the single `CounterStore` and everything that observes it. Startup
//! never fails on the durable store: `bootstrap` falls back to zeros.

use std::sync::Arc;

use tokio::time::Duration;

use pulseboard_core::error::Result;
use pulseboard_core::CounterState;

use crate::config::{GatewayConfig, PersistenceBackend, PersistenceSection};
use crate::counter::CounterStore;
use crate::ingest::SignalService;
use crate::obs::OpsMetrics;
use crate::persist::{
    load_or_init, CounterRepository, InMemoryCounterRepository, Persistence,
    SqliteCounterRepository,
};
use crate::realtime::Broadcaster;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    broadcaster: Arc<Broadcaster>,
    signals: SignalService,
    persistence: Persistence,
    metrics: Arc<OpsMetrics>,
}

impl AppState {
    /// Load the persisted counters (or zeros) and build the state.
    pub async fn bootstrap(cfg: GatewayConfig, repo: Arc<dyn CounterRepository>) -> Self {
        let limit = Duration::from_millis(cfg.persistence.write_timeout_ms);
        let loaded = load_or_init(repo.as_ref(), limit).await;
        let state = Self::new(cfg, repo, loaded.state);
        if !loaded.in_sync {
            // The store may hold a record memory never saw.
            state.inner.persistence.mark_dirty();
        }
        state
    }

    /// Build state from an already-loaded snapshot. Must run inside a tokio
    /// runtime (spawns the persistence writer).
    pub fn new(cfg: GatewayConfig, repo: Arc<dyn CounterRepository>, initial: CounterState) -> Self {
        let metrics = Arc::new(OpsMetrics::default());

        let store = Arc::new(CounterStore::new());
        store.load(initial);

        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            cfg.broadcast.subscriber_queue,
        ));

        let (persistence, _writer) = Persistence::spawn(
            repo,
            Arc::clone(&store),
            Arc::clone(&metrics),
            cfg.persistence.queue_capacity,
            Duration::from_millis(cfg.persistence.write_timeout_ms),
        );

        let signals = SignalService::new(
            store,
            Arc::clone(&broadcaster),
            persistence.clone(),
            Arc::clone(&metrics),
        );

        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                broadcaster,
                signals,
                persistence,
                metrics,
            }),
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn signals(&self) -> &SignalService {
        &self.inner.signals
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub fn persistence(&self) -> &Persistence {
        &self.inner.persistence
    }

    pub fn metrics(&self) -> &OpsMetrics {
        &self.inner.metrics
    }

    /// Stop reporting ready and flush the full state to the store.
    pub async fn shutdown(&self) {
        self.inner.metrics.set_draining();
        let limit = Duration::from_millis(self.inner.cfg.persistence.write_timeout_ms * 2);
        self.inner.persistence.shutdown(limit).await;
    }
}

/// Build the repository named by the config.
pub async fn repository_from_config(cfg: &PersistenceSection) -> Result<Arc<dyn CounterRepository>> {
    match cfg.backend {
        PersistenceBackend::Sqlite => Ok(Arc::new(SqliteCounterRepository::connect(&cfg.url).await?)),
        PersistenceBackend::Memory => {
            tracing::warn!("memory persistence selected; counters reset on restart");
            Ok(Arc::new(InMemoryCounterRepository::new()))
        }
    }
}
