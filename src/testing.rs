//! Test doubles for the token provider and forwarder seams.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use crate::auth::{BearerCredential, TokenError, TokenErrorKind, TokenProvider};
use crate::forward::{ForwardError, ForwardResult, Forwarder, OutboundRequest, UpstreamResponse};

// ── StaticTokenProvider ───────────────────────────────────────────────────────

/// Returns a fixed token, or fails with a fixed kind, and counts calls.
pub struct StaticTokenProvider {
    outcome: Result<String, TokenErrorKind>,
    calls: AtomicUsize,
    audiences: Mutex<Vec<String>>,
}

impl StaticTokenProvider {
    pub fn ok(token: &str) -> Self {
        Self::with_outcome(Ok(token.to_string()))
    }

    pub fn failing(kind: TokenErrorKind) -> Self {
        Self::with_outcome(Err(kind))
    }

    fn with_outcome(outcome: Result<String, TokenErrorKind>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            audiences: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn audiences(&self) -> Vec<String> {
        self.audiences.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch(&self, audience: &str) -> Result<BearerCredential, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.audiences.lock().unwrap().push(audience.to_string());
        match &self.outcome {
            Ok(token) => Ok(BearerCredential::new(token.clone(), audience)),
            Err(TokenErrorKind::NoCredentials) => {
                Err(TokenError::no_credentials(audience, "no credentials in test"))
            }
            Err(TokenErrorKind::Refresh) => Err(TokenError::refresh(audience, "refresh failed in test")),
            Err(TokenErrorKind::Unexpected) => {
                Err(TokenError::unexpected(audience, "unexpected failure in test"))
            }
        }
    }
}

// ── RecordingForwarder ────────────────────────────────────────────────────────

/// What a [`RecordingForwarder`] answers with.
pub enum Reply {
    Respond(StatusCode, &'static str),
    /// Simulate a transport failure by dialling a closed port.
    Unreachable,
}

/// Records every request it is asked to send.
pub struct RecordingForwarder {
    reply: Reply,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RecordingForwarder {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers 200 with the given body.
    pub fn ok(body: &'static str) -> Self {
        Self::new(Reply::Respond(StatusCode::OK, body))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn send(&self, request: OutboundRequest) -> ForwardResult<UpstreamResponse> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Reply::Respond(status, body) => Ok(UpstreamResponse {
                status: *status,
                headers: HeaderMap::new(),
                body: Bytes::from_static(body.as_bytes()),
            }),
            Reply::Unreachable => {
                let source = reqwest::Client::new()
                    .get("http://127.0.0.1:1/")
                    .send()
                    .await
                    .expect_err("port 1 should refuse connections");
                Err(ForwardError::Transport { url, source })
            }
        }
    }
}
