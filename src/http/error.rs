//! Mapping of proxy failures to HTTP responses.
//!
//! Every error body has the shape `{"detail": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::auth::{TokenError, TokenErrorKind};
use crate::forward::ForwardError;

/// Terminal failure of a chat proxy request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No upstream URL configured.
    #[error("TARGET_CLOUD_RUN_URL is not set.")]
    MissingUpstream,

    /// The identity token could not be obtained.
    #[error("{}", auth_detail(.0))]
    Authentication(#[source] TokenError),

    /// The inbound body is not JSON.
    #[error("Invalid JSON body received from client.")]
    InvalidBody(#[source] serde_json::Error),

    /// The upstream could not be reached or did not answer in time.
    #[error("Failed to connect to external chat service: {0}")]
    Transport(#[source] ForwardError),

    /// The upstream answered with a non-2xx status.
    #[error("External chat service returned an error: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    /// The upstream answered 2xx but the body is not JSON.
    #[error("External chat service returned an invalid JSON body.")]
    InvalidUpstreamBody(#[source] serde_json::Error),

    /// Local failure while building the outbound request.
    #[error("An unexpected error occurred: {0}")]
    Internal(#[source] ForwardError),
}

fn auth_detail(err: &TokenError) -> String {
    match err.kind() {
        TokenErrorKind::NoCredentials => "Authentication failed: Default credentials not found. \
            Provide a service account key via GOOGLE_APPLICATION_CREDENTIALS, or run with an \
            attached service account."
            .to_string(),
        TokenErrorKind::Refresh => "Authentication failed: Unable to refresh ID token.".to_string(),
        TokenErrorKind::Unexpected => format!("Authentication failed unexpectedly: {}", err),
    }
}

impl From<ForwardError> for ProxyError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Auth(e) => ProxyError::Authentication(e),
            e @ ForwardError::Transport { .. } => ProxyError::Transport(e),
            e @ (ForwardError::Encode(_) | ForwardError::InvalidRequest { .. }) => {
                ProxyError::Internal(e)
            }
        }
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUpstream
            | ProxyError::Authentication(_)
            | ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::InvalidUpstreamBody(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::MissingUpstream => "config_error",
            ProxyError::Authentication(_) => "auth_error",
            ProxyError::InvalidBody(_) => "client_error",
            ProxyError::Transport(_) => "unavailable",
            ProxyError::UpstreamStatus { .. } => "upstream_error",
            ProxyError::InvalidUpstreamBody(_) => "bad_gateway",
            ProxyError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}
