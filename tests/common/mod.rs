//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chat_proxy::{HttpServer, ProxyConfig, Shutdown};
use tokio::net::TcpListener;

/// Headers and bodies seen by a mock upstream.
#[derive(Clone, Default)]
pub struct Seen(Arc<Mutex<Vec<(HeaderMap, Bytes)>>>);

impl Seen {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.0.lock().unwrap().last().and_then(|(headers, _)| {
            headers
                .get("authorization")
                .map(|v| v.to_str().unwrap().to_string())
        })
    }

    fn push(&self, headers: HeaderMap, body: Bytes) {
        self.0.lock().unwrap().push((headers, body));
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Upstream that answers `{"echo": <request body>}` on `/chat`.
pub async fn start_echo_upstream() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/chat",
            post(|State(seen): State<Seen>, headers: HeaderMap, body: Bytes| async move {
                let input: serde_json::Value = serde_json::from_slice(&body).unwrap();
                seen.push(headers, body);
                axum::Json(serde_json::json!({ "echo": input }))
            }),
        )
        .with_state(seen.clone());
    let addr = serve(app).await;
    (format!("http://{}/chat", addr), seen)
}

/// Upstream that answers every call with a fixed status and body.
pub async fn start_fixed_upstream(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route("/chat", post(move || async move { (status, body) }));
    let addr = serve(app).await;
    format!("http://{}/chat", addr)
}

/// Fake compute metadata server issuing `token` for any audience.
pub async fn start_metadata_server(token: &'static str) -> String {
    let app = Router::new()
        .route(
            "/",
            get(|| async { ([("metadata-flavor", "Google")], "computeMetadata/") }),
        )
        .route(
            "/computeMetadata/v1/instance/service-accounts/default/identity",
            get(move |headers: HeaderMap| async move {
                if headers.get("metadata-flavor").map(|v| v.as_bytes()) != Some(b"Google") {
                    return (StatusCode::FORBIDDEN, "missing Metadata-Flavor").into_response();
                }
                token.into_response()
            }),
        );
    let addr = serve(app).await;
    format!("http://{}", addr)
}

/// A URL nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/chat", addr)
}

/// Config pointing at `upstream`, serving static files from `static_root`.
pub fn config(upstream: &str, static_root: &Path) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = upstream.into();
    config.auth.enabled = false;
    config.static_files.root = static_root.to_path_buf();
    config
}

/// Write a minimal front end into a fresh temp dir.
pub fn static_site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<div id=\"root\"></div>").unwrap();
    dir
}

/// Run the proxy on an ephemeral port. Returns its base URL and the
/// shutdown handle that stops it.
pub async fn start_proxy(config: ProxyConfig) -> (String, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    (format!("http://{}", addr), shutdown)
}

/// Flags set by [`start_stalling_upstream`]'s handler.
#[derive(Clone, Default)]
pub struct Stall {
    pub entered: Arc<AtomicBool>,
    pub dropped: Arc<AtomicBool>,
    pub finished: Arc<AtomicBool>,
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Upstream whose `/chat` handler takes `delay` to answer. Records whether
/// the handler future was dropped and whether it ran to completion.
pub async fn start_stalling_upstream(delay: Duration) -> (String, Stall) {
    let stall = Stall::default();
    let app = Router::new()
        .route(
            "/chat",
            post(move |State(stall): State<Stall>| async move {
                stall.entered.store(true, Ordering::SeqCst);
                let _guard = DropFlag(stall.dropped.clone());
                tokio::time::sleep(delay).await;
                stall.finished.store(true, Ordering::SeqCst);
                "{}"
            }),
        )
        .with_state(stall.clone());
    let addr = serve(app).await;
    (format!("http://{}/chat", addr), stall)
}
