//! pulseboard gateway
//!
//! - `POST /signal`, `GET /metrics`, `POST /reset`
//! - WebSocket live channel on `/ws` (and `/`)
//! - Counters restored from the durable store at startup, flushed on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulseboard_core::error::{Result, PulseError};
use pulseboard_gateway::persist::{CounterRepository, InMemoryCounterRepository};
use pulseboard_gateway::{app_state, config, router};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "pulseboard-gateway exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = std::env::var("PULSEBOARD_CONFIG").unwrap_or_else(|_| "pulseboard.yaml".into());
    let mut cfg = config::load_from_file(&path)?;
    config::apply_port_override(&mut cfg, std::env::var("PORT").ok().as_deref())?;

    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|_| PulseError::BadRequest("server.listen must be a valid SocketAddr".into()))?;

    let repo: Arc<dyn CounterRepository> = match app_state::repository_from_config(&cfg.persistence).await {
        Ok(repo) => repo,
        Err(e) => {
            // Counters still work in memory; durability is lost for this run.
            tracing::warn!(error = %e, "durable store unavailable, using in-memory mirror");
            Arc::new(InMemoryCounterRepository::new())
        }
    };

    let state = app_state::AppState::bootstrap(cfg, repo).await;
    let app = router::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PulseError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "pulseboard-gateway running");

    // Flush as soon as the signal arrives: open WebSocket sessions may keep
    // `serve` from returning for a while.
    let draining = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            draining.shutdown().await;
        })
        .await
        .map_err(|e| PulseError::Internal(format!("server failed: {e}")))?;

    state.shutdown().await;
    tracing::info!("pulseboard-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
