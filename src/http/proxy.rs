//! The chat proxy endpoint.
//!
//! # Request Flow
//! ```text
//! OPTIONS                → 204, nothing else happens
//! no upstream configured → 500
//! auth enabled           → fetch token for upstream URL (500 on failure)
//! body                   → parse JSON (400 on failure)
//! forward                → POST JSON upstream, 60s timeout
//! relay                  → 2xx: status + JSON body
//!                          non-2xx: status + detail
//!                          transport failure: 503
//! ```
//!
//! Requests are independent; the only shared state is immutable.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;

use crate::auth::redact;
use crate::forward::OutboundRequest;
use crate::http::error::ProxyError;
use crate::http::server::AppState;
use crate::http::X_REQUEST_ID;
use crate::observability::metrics;

/// Handler for `/api/chat`.
pub async fn chat_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::info!(request_id = %request_id, method = %method, "Chat request received");

    // 1. Preflight
    if method == Method::OPTIONS {
        tracing::debug!(request_id = %request_id, "Answering preflight");
        metrics::record_request(method.as_str(), 204, "preflight", start_time);
        return StatusCode::NO_CONTENT.into_response();
    }

    match proxy_chat(&state, &headers, body).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), "relayed", start_time);
            response
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(
                    request_id = %request_id,
                    method = %method,
                    upstream = %state.config.upstream.url,
                    status = %status,
                    outcome = e.outcome(),
                    error = %e,
                    "Chat request failed"
                );
            } else {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    upstream = %state.config.upstream.url,
                    status = %status,
                    outcome = e.outcome(),
                    error = %e,
                    "Chat request rejected"
                );
            }
            metrics::record_request(method.as_str(), status.as_u16(), e.outcome(), start_time);
            e.into_response()
        }
    }
}

async fn proxy_chat(state: &AppState, headers: &HeaderMap, body: Bytes) -> Result<Response, ProxyError> {
    let upstream = &state.config.upstream;

    // 2. Configuration
    if !upstream.is_configured() {
        return Err(ProxyError::MissingUpstream);
    }

    // 3. Token
    let credential = if state.config.auth.enabled {
        match state.tokens.fetch(&upstream.url).await {
            Ok(credential) => {
                metrics::record_token_fetch("ok");
                tracing::debug!(
                    audience = %credential.audience(),
                    token = %redact(credential.token()),
                    "Fetched identity token"
                );
                Some(credential)
            }
            Err(e) => {
                metrics::record_token_fetch(&e.kind().to_string());
                return Err(ProxyError::Authentication(e));
            }
        }
    } else {
        tracing::debug!("Identity tokens disabled, forwarding without Authorization");
        None
    };

    // 4. Body
    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(ProxyError::InvalidBody)?;

    // 5. Forward
    let mut outbound = OutboundRequest::new(Method::POST, upstream.url.clone())
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .timeout(upstream.timeout())
        .json(&payload)?;
    if let Some(request_id) = headers.get(X_REQUEST_ID) {
        outbound = outbound.header(X_REQUEST_ID.clone(), request_id.clone());
    }
    if let Some(credential) = credential {
        outbound = outbound.bearer_token(credential.into_token());
    }

    let upstream_response = state.forwarder.send(outbound).await?;

    // 6. Relay
    if !upstream_response.is_success() {
        return Err(ProxyError::UpstreamStatus {
            status: upstream_response.status,
            body: upstream_response.text(),
        });
    }

    upstream_response
        .json::<IgnoredAny>()
        .map_err(ProxyError::InvalidUpstreamBody)?;

    Ok(Response::builder()
        .status(upstream_response.status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(upstream_response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

/// Handler for unknown `/api/*` paths; these never fall back to the SPA.
pub async fn api_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "detail": "Not Found" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenErrorKind;
    use crate::config::ProxyConfig;
    use crate::http::HttpServer;
    use crate::testing::{RecordingForwarder, Reply, StaticTokenProvider};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    const UPSTREAM: &str = "https://agent.example.run.app/chat";

    struct Harness {
        tokens: Arc<StaticTokenProvider>,
        forwarder: Arc<RecordingForwarder>,
        server: HttpServer,
    }

    fn harness(auth_enabled: bool, tokens: StaticTokenProvider, forwarder: RecordingForwarder) -> Harness {
        let mut config = ProxyConfig::default();
        config.upstream.url = UPSTREAM.into();
        config.auth.enabled = auth_enabled;

        let tokens = Arc::new(tokens);
        let forwarder = Arc::new(forwarder);
        let server = HttpServer::with_components(config, tokens.clone(), forwarder.clone());
        Harness {
            tokens,
            forwarder,
            server,
        }
    }

    async fn call(server: &HttpServer, method: Method, body: &'static str) -> (StatusCode, HeaderMap, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    #[tokio::test]
    async fn test_options_is_no_content_regardless_of_auth() {
        for auth_enabled in [true, false] {
            let h = harness(
                auth_enabled,
                StaticTokenProvider::failing(TokenErrorKind::NoCredentials),
                RecordingForwarder::ok("{}"),
            );
            let (status, _, body) = call(&h.server, Method::OPTIONS, "").await;
            assert_eq!(status, StatusCode::NO_CONTENT);
            assert!(body.is_null());
            assert_eq!(h.tokens.calls(), 0);
            assert_eq!(h.forwarder.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_never_forwarded() {
        for body in ["{not json", "", "[1, 2"] {
            let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::ok("{}"));
            let (status, _, json) = call(&h.server, Method::POST, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["detail"], "Invalid JSON body received from client.");
            assert_eq!(h.forwarder.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_auth_disabled_sends_no_authorization() {
        let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::ok(r#"{"ok":true}"#));
        let (status, _, _) = call(&h.server, Method::POST, r#"{"message":"hi"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.tokens.calls(), 0);
        let sent = h.forwarder.requests();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].bearer_token.is_none());
        assert!(sent[0].audience.is_none());
        assert!(!sent[0].headers.contains_key(header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn test_auth_enabled_attaches_token_for_upstream_audience() {
        let h = harness(true, StaticTokenProvider::ok("id-token"), RecordingForwarder::ok("{}"));
        let (status, _, _) = call(&h.server, Method::POST, r#"{"message":"hi"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.tokens.audiences(), vec![UPSTREAM.to_string()]);
        let sent = &h.forwarder.requests()[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url, UPSTREAM);
        assert_eq!(sent.bearer_token.as_deref(), Some("id-token"));
        assert_eq!(sent.timeout, std::time::Duration::from_secs(60));
        assert_eq!(sent.headers[header::CONTENT_TYPE], "application/json");
        assert!(sent.headers.contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_token_failures_stop_before_forwarding() {
        for kind in [
            TokenErrorKind::NoCredentials,
            TokenErrorKind::Refresh,
            TokenErrorKind::Unexpected,
        ] {
            let h = harness(true, StaticTokenProvider::failing(kind), RecordingForwarder::ok("{}"));
            let (status, _, json) = call(&h.server, Method::POST, r#"{"message":"hi"}"#).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "kind {:?}", kind);
            assert!(json["detail"].as_str().unwrap().starts_with("Authentication failed"));
            assert_eq!(h.forwarder.calls(), 0, "kind {:?}", kind);
        }
    }

    #[tokio::test]
    async fn test_missing_upstream_is_server_error() {
        let tokens = Arc::new(StaticTokenProvider::ok("t"));
        let forwarder = Arc::new(RecordingForwarder::ok("{}"));
        let server = HttpServer::with_components(ProxyConfig::default(), tokens.clone(), forwarder.clone());

        let (status, _, json) = call(&server, Method::POST, "{}").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"], "TARGET_CLOUD_RUN_URL is not set.");
        assert_eq!(tokens.calls(), 0);
        assert_eq!(forwarder.calls(), 0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_with(&self, message: &str) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .filter(|line| line.contains(message))
                .map(String::from)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_failures_are_logged_with_method() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = HttpServer::with_components(
            ProxyConfig::default(),
            Arc::new(StaticTokenProvider::ok("t")),
            Arc::new(RecordingForwarder::ok("{}")),
        );
        let (status, _, _) = call(&server, Method::POST, "{}").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::ok("{}"));
        let (status, _, _) = call(&h.server, Method::PUT, "{oops").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let (status, _, _) = call(&h.server, Method::GET, "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let failed = logs.lines_with("Chat request failed");
        assert_eq!(failed.len(), 1);
        assert!(failed[0].contains("method=POST"), "{}", failed[0]);

        let rejected = logs.lines_with("Chat request rejected");
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].contains("method=GET"), "{}", rejected[0]);
    }

    #[tokio::test]
    async fn test_success_relayed_verbatim() {
        let h = harness(
            false,
            StaticTokenProvider::ok("t"),
            RecordingForwarder::new(Reply::Respond(StatusCode::CREATED, r#"{"response":"hello","n":1}"#)),
        );
        let (status, headers, json) = call(&h.server, Method::POST, r#"{"message":"hi"}"#).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(json, serde_json::json!({"response": "hello", "n": 1}));
    }

    #[tokio::test]
    async fn test_get_is_proxied_as_post() {
        let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::ok("{}"));
        let (status, _, _) = call(&h.server, Method::GET, r#"{"message":"hi"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.forwarder.requests()[0].method, Method::POST);
    }

    #[tokio::test]
    async fn test_upstream_error_status_relayed_with_detail() {
        let h = harness(
            false,
            StaticTokenProvider::ok("t"),
            RecordingForwarder::new(Reply::Respond(StatusCode::SERVICE_UNAVAILABLE, "\"overloaded\"")),
        );
        let (status, _, json) = call(&h.server, Method::POST, "{}").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["detail"].as_str().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_service_unavailable() {
        let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::new(Reply::Unreachable));
        let (status, _, json) = call(&h.server, Method::POST, "{}").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to connect to external chat service"));
        assert_eq!(h.forwarder.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_json_success_is_bad_gateway() {
        let h = harness(
            false,
            StaticTokenProvider::ok("t"),
            RecordingForwarder::new(Reply::Respond(StatusCode::OK, "<html>oops</html>")),
        );
        let (status, _, _) = call(&h.server, Method::POST, "{}").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        let h = harness(false, StaticTokenProvider::ok("t"), RecordingForwarder::ok("{}"));
        let (status, _, _) = call(&h.server, Method::DELETE, "{}").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(h.forwarder.calls(), 0);
    }
}
