#![allow(clippy::unwrap_used)]
// End-to-end connection scenarios against an in-process WebSocket server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use wsload_api::WsDialer;
use wsload_core::{ConnectionManager, LoadTestConfig, RetryPolicy, StatsAggregator};

// ── Helpers ─────────────────────────────────────────────────────────

type Headers = Arc<Mutex<Vec<(String, String)>>>;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        dial_backoff: Duration::from_secs(30),
        read_backoff: Duration::from_millis(20),
        send_spacing: Duration::from_millis(1),
    }
}

fn config(addr: SocketAddr, subscriptions: &str, instances: u32) -> LoadTestConfig {
    let url = Url::parse(&format!("ws://{addr}/v1/app")).unwrap();
    let mut cfg = LoadTestConfig::new(url, "xrplevm");
    cfg.subscriptions = subscriptions.into();
    cfg.instances = instances;
    cfg.retry = fast_retry();
    cfg
}

struct Harness {
    manager: Arc<ConnectionManager<WsDialer>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(cfg: LoadTestConfig) -> Self {
        let cancel = CancellationToken::new();
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(cfg),
            Arc::new(StatsAggregator::new()),
            WsDialer::new(),
            cancel.clone(),
        ));
        let runner = Arc::clone(&manager);
        let task = tokio::spawn(async move { runner.run().await });
        Self {
            manager,
            cancel,
            task,
        }
    }

    /// Poll until `check` holds, failing the test after five seconds.
    async fn wait_for(&self, what: &str, check: impl Fn(&ConnectionManager<WsDialer>) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !check(self.manager.as_ref()) {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn stop(self) -> Arc<ConnectionManager<WsDialer>> {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("manager did not stop")
            .unwrap();
        self.manager
    }
}

/// Accept one WebSocket client, recording its handshake headers.
async fn accept_one(
    listener: &TcpListener,
    headers: Headers,
) -> tokio_tungstenite::WebSocketStream<tokio::net::TcpStream> {
    let (tcp, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_hdr_async(tcp, move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let mut seen = headers.lock().unwrap();
        for (name, value) in req.headers() {
            seen.push((name.as_str().to_owned(), value.to_str().unwrap_or("").to_owned()));
        }
        Ok(resp)
    })
    .await
    .unwrap()
}

fn header(headers: &Headers, name: &str) -> Option<String> {
    headers
        .lock()
        .unwrap()
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test]
async fn subscribes_every_instance_and_attributes_notifications() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let headers: Headers = Arc::default();

    let server_headers = Arc::clone(&headers);
    let server = tokio::spawn(async move {
        let mut ws = accept_one(&listener, server_headers).await;
        let mut requests = Vec::new();
        while requests.len() < 4 {
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                break;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let id = request["id"].as_u64().unwrap();
            ws.send(Message::text(
                json!({"jsonrpc": "2.0", "id": id, "result": format!("0xsub{id}")}).to_string(),
            ))
            .await
            .unwrap();
            requests.push(request);
        }
        for id in 1..=4 {
            ws.send(Message::text(
                json!({
                    "jsonrpc": "2.0",
                    "method": "eth_subscription",
                    "params": {"subscription": format!("0xsub{id}"), "result": {"number": "0x1"}}
                })
                .to_string(),
            ))
            .await
            .unwrap();
        }
        // Hold the socket open until the client leaves.
        while let Some(Ok(_)) = ws.next().await {}
        requests
    });

    let mut cfg = config(addr, "newHeads,logs", 2);
    cfg.auth = Some(SecretString::from("secret-key".to_owned()));
    let harness = Harness::start(cfg);
    harness
        .wait_for("four notifications", |m| {
            m.stats().snapshot().stats.subscription_events == 4
        })
        .await;
    let manager = harness.stop().await;
    let requests = server.await.unwrap();

    let ids: Vec<u64> = requests.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(requests[0]["method"], "eth_subscribe");
    assert_eq!(requests[0]["params"], json!(["newHeads"]));
    assert_eq!(requests[2]["params"], json!(["logs", {"topics": [null]}]));

    assert_eq!(header(&headers, "Target-Service-Id").as_deref(), Some("xrplevm"));
    assert_eq!(header(&headers, "Authorization").as_deref(), Some("secret-key"));

    assert_eq!(manager.total_subscriptions(), 4);
    let snap = manager.stats().snapshot();
    assert_eq!(snap.stats.total_connections, 1);
    assert_eq!(snap.stats.reconnections, 0);
    assert_eq!(snap.stats.confirmation_events, 4);
    assert_eq!(snap.stats.events_received, 8);
    assert_eq!(snap.messages_by_type.get("newHeads"), Some(&2));
    assert_eq!(snap.messages_by_type.get("logs"), Some(&2));
    assert_eq!(manager.stats().lookup_type("0xsub3").as_deref(), Some("logs"));
}

#[tokio::test]
async fn server_close_ends_epoch_and_redial_counts_attempt_only() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(&listener, Arc::default()).await;
        ws.close(None).await.ok();
        // Dropping the listener makes the redial fail.
    });

    let harness = Harness::start(config(addr, "newHeads", 1));
    server.await.unwrap();
    harness
        .wait_for("redial", |m| {
            let s = m.stats().snapshot().stats;
            s.connection_attempts >= 2 && s.reconnections >= 2
        })
        .await;
    let manager = harness.stop().await;

    let snap = manager.stats().snapshot();
    assert_eq!(snap.stats.connection_attempts, 2);
    assert_eq!(snap.stats.total_connections, 1);
    // One for the dropped connection, one for the refused redial.
    assert_eq!(snap.stats.reconnections, 2);
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.history[0].number, 1);
    assert!(!snap.connection_open);
}

#[tokio::test]
async fn unrecognized_frame_moves_only_base_counters() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(&listener, Arc::default()).await;
        let _ = ws.next().await;
        ws.send(Message::text("{}")).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let harness = Harness::start(config(addr, "newHeads", 1));
    harness
        .wait_for("one frame", |m| m.stats().snapshot().stats.events_received == 1)
        .await;
    let manager = harness.stop().await;
    server.await.unwrap();

    let s = manager.stats().snapshot();
    assert_eq!(s.stats.current_conn_messages, 1);
    assert_eq!(s.stats.subscription_events, 0);
    assert_eq!(s.stats.confirmation_events, 0);
    assert_eq!(s.stats.error_events, 0);
    assert!(s.messages_by_type.is_empty());
    assert_eq!(s.stats.reconnections, 0);
}

#[tokio::test]
async fn final_report_flushes_the_open_connection_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut ws = accept_one(&listener, Arc::default()).await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    let harness = Harness::start(config(addr, "newHeads", 1));
    harness
        .wait_for("subscription", |m| m.total_subscriptions() == 1)
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let manager = harness.stop().await;
    server.await.unwrap();

    let first = manager.stats().final_report(manager.total_subscriptions());
    let second = manager.stats().final_report(manager.total_subscriptions());
    assert!(first.total_uptime >= Duration::from_millis(50));
    assert_eq!(first.total_uptime, second.total_uptime);
    assert_eq!(first.total_connections, 1);
    assert_eq!(first.reconnections, 0);
}
