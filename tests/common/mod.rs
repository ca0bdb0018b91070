//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use airtabler::config::GatewayConfig;
use airtabler::http::{HttpServer, ServerError};
use airtabler::lifecycle::{Lifecycle, Shutdown};
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub at: Instant,
}

type Reply = Pin<Box<dyn Future<Output = (u16, String)> + Send>>;
type Handler = Arc<dyn Fn(Recorded) -> Reply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    handler: Handler,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

/// Start a programmable mock upstream. The closure sees each request and
/// returns the status and body to answer with.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockUpstream
where
    F: Fn(Recorded) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let handler: Handler = Arc::new(move |req| Box::pin(f(req)) as Reply);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        handler,
        requests: requests.clone(),
    };

    let app = Router::new().fallback(mock_handler).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, requests }
}

/// Start a mock upstream that always answers 200 with `response`.
pub async fn start_mock_backend(response: &'static str) -> MockUpstream {
    start_programmable_backend(move |_| async move { (200, response.to_string()) }).await
}

async fn mock_handler(State(state): State<MockState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let recorded = Recorded {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        at: Instant::now(),
    };
    state.requests.lock().unwrap().push(recorded.clone());

    let (status, body) = (state.handler)(recorded).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [("x-upstream", "mock")], body).into_response()
}

/// Gateway config pointed at `upstream`, with fast retries.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.api_root = format!("http://{}/v0", upstream);
    config.upstream.base_id = "appTest".into();
    config.upstream.api_key = "test-key".into();
    config.rate_limit.requests_per_second = 50;
    config.retries.cooldown_ms = 50;
    config.retries.jitter_ratio = 0.0;
    config.timeouts.upstream_secs = 5;
    config
}

/// A gateway running in the background.
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub lifecycle: Lifecycle,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_gateway(config: GatewayConfig) -> RunningGateway {
    let server = HttpServer::new(config).unwrap();
    let lifecycle = server.lifecycle();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    RunningGateway {
        addr,
        shutdown,
        lifecycle,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap()
}
