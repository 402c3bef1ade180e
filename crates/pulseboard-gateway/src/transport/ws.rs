//! WebSocket handler for dashboard subscribers.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Subscribe (INIT is queued before the first update can be)
//! - Forward queued pushes to the socket
//! - Lifecycle: ping + idle timeout; inbound payloads are ignored
//!
//! Unsubscription is tied to the `Subscription` guard, so every exit path
//! (client close, transport error, idle timeout, eviction) cleans up.

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{timeout, Duration, Instant};

use pulseboard_core::error::Result;

use crate::app_state::AppState;

/// Upper bound on a single socket write before the client is dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(app, socket).await {
            tracing::warn!(error = %e, "subscriber session failed");
        }
    })
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, socket: WebSocket) -> Result<()> {
    let mut sub = app.broadcaster().subscribe()?;
    let id = sub.id();
    tracing::info!(subscriber = id, "dashboard client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let srv = &app.cfg().server;
    let ping_every = Duration::from_millis(srv.ping_interval_ms);
    let idle_timeout = Duration::from_millis(srv.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval(ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_activity = Instant::now();

    let reason = loop {
        tokio::select! {
            // outbound writer
            maybe_out = sub.recv() => {
                let Some(m) = maybe_out else { break "evicted"; };
                if let Err(reason) = send_within(&mut ws_tx, m, WRITE_TIMEOUT).await {
                    break reason;
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break "disconnected"; };
                let Ok(msg) = incoming else { break "transport error"; };

                last_activity = Instant::now();

                match msg {
                    Message::Ping(payload) => {
                        let pong = Message::Pong(payload);
                        if let Err(reason) = send_within(&mut ws_tx, pong, WRITE_TIMEOUT).await {
                            break reason;
                        }
                    }
                    Message::Close(_) => break "closed by client",
                    // Dashboards are receive-only.
                    Message::Text(_) | Message::Binary(_) | Message::Pong(_) => {}
                }
            }

            // ping + idle timeout
            _ = ping_tick.tick() => {
                if last_activity.elapsed() >= idle_timeout {
                    break "idle timeout";
                }
                let ping = Message::Ping(Vec::new());
                if let Err(reason) = send_within(&mut ws_tx, ping, WRITE_TIMEOUT).await {
                    break reason;
                }
            }
        }
    };

    sub.close();
    let _ = timeout(WRITE_TIMEOUT, ws_tx.close()).await;
    tracing::info!(subscriber = id, reason, "dashboard client disconnected");
    Ok(())
}

/// Write one frame, giving up after `limit`. The error is the disconnect
/// reason.
async fn send_within<S>(
    tx: &mut S,
    msg: Message,
    limit: Duration,
) -> std::result::Result<(), &'static str>
where
    S: Sink<Message> + Unpin,
{
    match timeout(limit, tx.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err("send failed"),
        Err(_) => Err("write timeout"),
    }
}
