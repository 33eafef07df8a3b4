//! Outbound request and upstream response types.

use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::auth::redact;
use crate::forward::error::ForwardError;

/// Timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire body of an outbound request. Exactly one variant is ever sent.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    Empty,
    /// Caller-supplied bytes, sent as-is.
    Body(Bytes),
    /// Serialized JSON payload.
    Json(Bytes),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Empty => 0,
            Payload::Body(b) | Payload::Json(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Body(b) => write!(f, "Body({} bytes)", b.len()),
            Payload::Json(b) => write!(f, "Json({} bytes)", b.len()),
        }
    }
}

/// A single outbound HTTP call.
///
/// Authentication is resolved by the forwarder: a pre-supplied bearer token
/// wins over an audience. A caller `Authorization` header is never sent;
/// it is replaced by the resolved token or dropped when there is none.
#[derive(Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub payload: Payload,
    pub bearer_token: Option<String>,
    pub audience: Option<String>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            payload: Payload::Empty,
            bearer_token: None,
            audience: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge `headers` in, replacing existing values for the same names.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Send these bytes as the body. An explicit body always wins over JSON.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.payload = Payload::Body(body.into());
        self
    }

    /// Serialize `payload` as the JSON body.
    ///
    /// Ignored when an explicit body is already set. Encoding happens here,
    /// so failures surface before anything touches the network.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, ForwardError> {
        if matches!(self.payload, Payload::Body(_)) {
            tracing::debug!(url = %self.url, "Explicit body set, ignoring JSON payload");
            return Ok(self);
        }
        let bytes = serde_json::to_vec(payload).map_err(ForwardError::Encode)?;
        self.payload = Payload::Json(Bytes::from(bytes));
        Ok(self)
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Final header set for the wire: caller `Authorization` removed, bearer
    /// token applied, JSON content type defaulted.
    pub(crate) fn wire_headers(&self, token: Option<&str>) -> Result<HeaderMap, ForwardError> {
        let mut headers = self.headers.clone();
        headers.remove(header::AUTHORIZATION);

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ForwardError::InvalidRequest {
                    url: self.url.clone(),
                    reason: "bearer token contains invalid header characters".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        if matches!(self.payload, Payload::Json(_)) && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        Ok(headers)
    }
}

impl fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("payload", &self.payload)
            .field("bearer_token", &self.bearer_token.as_deref().map(redact))
            .field("audience", &self.audience)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Upstream response, fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
