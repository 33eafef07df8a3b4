//! Forwarder error definitions.

use thiserror::Error;

use crate::auth::TokenError;

/// Errors that can occur while forwarding a request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The JSON payload could not be serialized. Nothing was sent.
    #[error("failed to encode JSON payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bearer token could not be obtained. Nothing was sent.
    #[error("authentication setup failed: {0}")]
    Auth(#[from] TokenError),

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },

    /// Connection refused, DNS failure, timeout or a broken response stream.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ForwardError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Transport { source, .. } if source.is_timeout())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ForwardError::Transport { .. })
    }
}

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;
