//! End-to-end tests: HTTP signal/query/reset plus the WebSocket live channel,
//! against a server bound to an ephemeral port.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use pulseboard_core::protocol::push::PushMessage;
use pulseboard_core::{CounterState, MetricName};
use pulseboard_gateway::app_state::AppState;
use pulseboard_gateway::config::{GatewayConfig, PersistenceBackend};
use pulseboard_gateway::persist::InMemoryCounterRepository;
use pulseboard_gateway::router::build_router;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server helper - starts server on a random port
struct TestServer {
    base_url: String,
    ws_url: String,
    client: Client,
    state: AppState,
    repo: Arc<InMemoryCounterRepository>,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(InMemoryCounterRepository::new()).await
    }

    async fn start_with(repo: InMemoryCounterRepository) -> Self {
        let mut cfg = GatewayConfig::default();
        cfg.persistence.backend = PersistenceBackend::Memory;

        let repo = Arc::new(repo);
        let state = AppState::bootstrap(cfg, repo.clone()).await;

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let app = build_router(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            client: Client::new(),
            state,
            repo,
            _handle: handle,
        }
    }

    async fn signal(&self, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}/signal", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn metrics(&self) -> Value {
        self.client
            .get(format!("{}/metrics", self.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn subscribe(&self) -> Ws {
        let (ws, _resp) = connect_async(self.ws_url.as_str()).await.unwrap();
        ws
    }
}

/// Next INIT/UPDATE, skipping control frames.
async fn next_push(ws: &mut Ws) -> PushMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for push")
            .expect("socket closed")
            .unwrap();
        match frame {
            Message::Text(s) => return serde_json::from_str(&s).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert no push arrives within a short window.
async fn assert_quiet(ws: &mut Ws) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(200);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn sequential_signals_are_counted_and_queryable() {
    let srv = TestServer::start().await;

    for metric in ["paircode", "api", "bot", "cdn"] {
        for n in 1..=4 {
            let (status, body) = srv.signal(json!({ "type": metric })).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "success": true, "newCount": n }));
        }
    }

    assert_eq!(
        srv.metrics().await,
        json!({ "paircode": 4, "api": 4, "bot": 4, "cdn": 4 })
    );
}

#[tokio::test]
async fn invalid_signals_are_rejected_without_side_effects() {
    let srv = TestServer::start().await;
    srv.signal(json!({ "type": "bot" })).await;
    let before = srv.metrics().await;
    let mut ws = srv.subscribe().await;
    let _init = next_push(&mut ws).await;

    let (status, body) = srv.signal(json!({ "type": "nonexistent" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid metric type" }));

    let (status, body) = srv.signal(json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Type is required" }));

    let resp = srv
        .client
        .post(format!("{}/signal", srv.base_url))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Type is required");

    assert_eq!(srv.metrics().await, before);
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn parallel_signals_lose_nothing() {
    let srv = Arc::new(TestServer::start().await);

    let calls = (0..100).map(|_| {
        let srv = Arc::clone(&srv);
        async move { srv.signal(json!({ "type": "api" })).await }
    });
    let results = futures_util::future::join_all(calls).await;
    assert!(results.iter().all(|(s, _)| *s == StatusCode::OK));

    let mut counts: Vec<u64> = results
        .iter()
        .map(|(_, b)| b["newCount"].as_u64().unwrap())
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=100).collect::<Vec<_>>());

    assert_eq!(srv.metrics().await["api"], 100);
}

#[tokio::test]
async fn new_subscriber_gets_current_state_then_updates() {
    let srv = TestServer::start().await;
    for _ in 0..3 {
        srv.signal(json!({ "type": "paircode" })).await;
    }
    for _ in 0..5 {
        srv.signal(json!({ "type": "bot" })).await;
    }

    let mut a = srv.subscribe().await;
    let mut b = srv.subscribe().await;
    let expected = PushMessage::init(CounterState {
        paircode: 3,
        bot: 5,
        ..CounterState::zero()
    });
    assert_eq!(next_push(&mut a).await, expected);
    assert_eq!(next_push(&mut b).await, expected);

    let (_, body) = srv.signal(json!({ "type": "bot" })).await;
    assert_eq!(body["newCount"], 6);

    for ws in [&mut a, &mut b] {
        assert_eq!(next_push(ws).await, PushMessage::update(MetricName::Bot, 6));
        assert_quiet(ws).await;
    }
}

#[tokio::test]
async fn updates_arrive_in_mutation_order() {
    let srv = Arc::new(TestServer::start().await);
    let mut ws = srv.subscribe().await;
    let _init = next_push(&mut ws).await;

    let calls = (0..50).map(|_| {
        let srv = Arc::clone(&srv);
        async move { srv.signal(json!({ "type": "cdn" })).await }
    });
    futures_util::future::join_all(calls).await;

    for expected in 1..=50 {
        assert_eq!(
            next_push(&mut ws).await,
            PushMessage::update(MetricName::Cdn, expected)
        );
    }
}

#[tokio::test]
async fn reset_zeroes_and_resyncs_subscribers() {
    let srv = TestServer::start().await;
    srv.signal(json!({ "type": "cdn" })).await;
    let mut ws = srv.subscribe().await;
    let _init = next_push(&mut ws).await;

    let resp = srv
        .client
        .post(format!("{}/reset", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Metrics reset",
            "metrics": { "paircode": 0, "api": 0, "bot": 0, "cdn": 0 }
        })
    );

    assert_eq!(next_push(&mut ws).await, PushMessage::init(CounterState::zero()));
    assert_eq!(
        srv.metrics().await,
        json!({ "paircode": 0, "api": 0, "bot": 0, "cdn": 0 })
    );

    srv.state.persistence().flush().await;
    assert_eq!(srv.repo.record().await, Some(CounterState::zero()));
}

#[tokio::test]
async fn persisted_state_is_served_after_restart() {
    let persisted = CounterState {
        paircode: 10,
        api: 2,
        bot: 0,
        cdn: 7,
    };
    let srv = TestServer::start_with(InMemoryCounterRepository::with_record(persisted)).await;

    assert_eq!(
        srv.metrics().await,
        json!({ "paircode": 10, "api": 2, "bot": 0, "cdn": 7 })
    );
    let mut ws = srv.subscribe().await;
    assert_eq!(next_push(&mut ws).await, PushMessage::init(persisted));
}

#[tokio::test]
async fn store_outage_does_not_affect_live_path() {
    let srv = TestServer::start().await;
    let mut ws = srv.subscribe().await;
    let _init = next_push(&mut ws).await;

    srv.repo.set_available(false);
    let (status, body) = srv.signal(json!({ "type": "api" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newCount"], 1);
    assert_eq!(next_push(&mut ws).await, PushMessage::update(MetricName::Api, 1));
    srv.signal(json!({ "type": "bot" })).await;
    let _ = next_push(&mut ws).await;

    srv.repo.set_available(true);
    srv.signal(json!({ "type": "api" })).await;
    srv.state.persistence().flush().await;

    let record = srv.repo.record().await.unwrap();
    assert_eq!(serde_json::to_value(record).unwrap(), srv.metrics().await);
    assert_eq!(record.api, 2);
    assert_eq!(record.bot, 1);
}

#[tokio::test]
async fn store_down_at_startup_converges_after_recovery() {
    let repo = InMemoryCounterRepository::with_record(CounterState {
        paircode: 10,
        api: 2,
        bot: 0,
        cdn: 7,
    });
    repo.set_available(false);
    let srv = TestServer::start_with(repo).await;
    assert_eq!(
        srv.metrics().await,
        json!({ "paircode": 0, "api": 0, "bot": 0, "cdn": 0 })
    );

    srv.repo.set_available(true);
    let (status, body) = srv.signal(json!({ "type": "paircode" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newCount"], 1);
    srv.state.persistence().flush().await;

    let record = srv.repo.record().await.unwrap();
    assert_eq!(serde_json::to_value(record).unwrap(), srv.metrics().await);
    assert_eq!(
        record,
        CounterState {
            paircode: 1,
            ..CounterState::zero()
        }
    );
}

#[tokio::test]
async fn client_close_unregisters_subscriber() {
    let srv = TestServer::start().await;
    let mut ws = srv.subscribe().await;
    let _init = next_push(&mut ws).await;
    assert_eq!(srv.state.broadcaster().registry().len(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !srv.state.broadcaster().registry().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "subscriber not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(srv.state.metrics().subscribers_active.get(), 0);

    // Signals keep working with nobody listening.
    let (status, _) = srv.signal(json!({ "type": "cdn" })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ops_endpoints_report_health_and_counters() {
    let srv = TestServer::start().await;
    srv.signal(json!({ "type": "api" })).await;
    srv.signal(json!({ "type": "nope" })).await;

    let health = srv
        .client
        .get(format!("{}/healthz", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ready = srv
        .client
        .get(format!("{}/readyz", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), StatusCode::OK);

    let text = srv
        .client
        .get(format!("{}/ops/metrics", srv.base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("pulseboard_signals_total{result=\"ok\"} 1"));
    assert!(text.contains("pulseboard_signals_total{result=\"invalid\"} 1"));

    srv.state.shutdown().await;
    let draining = srv
        .client
        .get(format!("{}/readyz", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);
}
