//! The authenticated forwarder.
//!
//! # Responsibilities
//! - Resolve the bearer token (pre-supplied, fetched for an audience, or none)
//! - Build exactly one outbound request and send it
//! - Buffer the upstream response and hand it back untouched

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{redact, TokenError, TokenProvider};
use crate::forward::error::{ForwardError, ForwardResult};
use crate::forward::request::{OutboundRequest, Payload, UpstreamResponse};

/// Sends one outbound request and returns the upstream response.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> ForwardResult<UpstreamResponse>;
}

/// `reqwest`-backed forwarder.
#[derive(Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl HttpForwarder {
    /// Forwarder able to fetch tokens for requests that name an audience.
    pub fn new(client: reqwest::Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens: Some(tokens),
        }
    }

    /// Forwarder that only uses pre-supplied bearer tokens.
    pub fn without_tokens(client: reqwest::Client) -> Self {
        Self {
            client,
            tokens: None,
        }
    }

    async fn resolve_token(&self, request: &OutboundRequest) -> ForwardResult<Option<String>> {
        if let Some(token) = &request.bearer_token {
            tracing::debug!(url = %request.url, "Using provided bearer token");
            return Ok(Some(token.clone()));
        }

        let Some(audience) = &request.audience else {
            return Ok(None);
        };

        let tokens = self.tokens.as_ref().ok_or_else(|| {
            TokenError::no_credentials(audience, "forwarder has no token provider")
        })?;

        match tokens.fetch(audience).await {
            Ok(credential) => {
                tracing::debug!(
                    audience = %audience,
                    token = %redact(credential.token()),
                    "Fetched bearer token for audience"
                );
                Ok(Some(credential.into_token()))
            }
            Err(e) => {
                tracing::error!(audience = %audience, kind = %e.kind(), error = %e, "Token fetch failed");
                Err(ForwardError::Auth(e))
            }
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn send(&self, request: OutboundRequest) -> ForwardResult<UpstreamResponse> {
        // 1. Authentication, before anything touches the network
        let token = self.resolve_token(&request).await?;

        // 2. Build the request
        let url = reqwest::Url::parse(&request.url).map_err(|e| ForwardError::InvalidRequest {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let headers = request.wire_headers(token.as_deref())?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .timeout(request.timeout);
        match &request.payload {
            Payload::Body(bytes) | Payload::Json(bytes) => builder = builder.body(bytes.clone()),
            Payload::Empty => {}
        }

        if token.is_some() {
            tracing::info!(method = %request.method, url = %request.url, "Sending authenticated request");
        } else {
            tracing::warn!(method = %request.method, url = %request.url, "Sending unauthenticated request");
        }

        // 3. Send, single attempt
        let transport = |source: reqwest::Error| ForwardError::Transport {
            url: request.url.clone(),
            source,
        };
        let response = builder.send().await.map_err(|e| {
            tracing::error!(url = %request.url, error = %e, timeout = e.is_timeout(), "Upstream request failed");
            transport(e)
        })?;

        // 4. Buffer the response
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport)?;

        tracing::info!(
            url = %request.url,
            status = %status,
            bytes = body.len(),
            "Received upstream response"
        );

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
