//! Bearer credentials and the token provider contract.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Number of token characters that may ever appear in logs.
pub const REDACTED_PREFIX_LEN: usize = 8;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Return a log-safe rendering of a token: a bounded prefix and an ellipsis.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(REDACTED_PREFIX_LEN).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        // Short tokens are hidden entirely.
        "***".to_string()
    }
}

/// An identity token minted for one audience.
///
/// Fetched fresh for each outbound call and dropped with it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential {
    token: String,
    audience: String,
}

impl BearerCredential {
    pub fn new(token: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            audience: audience.into(),
        }
    }

    /// The raw token. Never log this value; use [`redact`].
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn into_token(self) -> String {
        self.token
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerCredential")
            .field("token", &redact(&self.token))
            .field("audience", &self.audience)
            .finish()
    }
}

/// Which credential step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// No ambient identity source could be found.
    NoCredentials,
    /// An identity source exists but minting a token failed.
    Refresh,
    /// Anything else (malformed key material, unusable responses, ...).
    Unexpected,
}

impl fmt::Display for TokenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenErrorKind::NoCredentials => "no_credentials",
            TokenErrorKind::Refresh => "refresh",
            TokenErrorKind::Unexpected => "unexpected",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while fetching an identity token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no credentials available for audience {audience}: {reason}")]
    NoCredentials {
        audience: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("unable to refresh identity token for audience {audience}: {reason}")]
    Refresh {
        audience: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("unexpected error fetching identity token for audience {audience}: {reason}")]
    Unexpected {
        audience: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl TokenError {
    pub fn no_credentials(audience: &str, reason: impl Into<String>) -> Self {
        TokenError::NoCredentials {
            audience: audience.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn refresh(audience: &str, reason: impl Into<String>) -> Self {
        TokenError::Refresh {
            audience: audience.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn unexpected(audience: &str, reason: impl Into<String>) -> Self {
        TokenError::Unexpected {
            audience: audience.to_string(),
            reason: reason.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &mut self {
            TokenError::NoCredentials { source, .. }
            | TokenError::Refresh { source, .. }
            | TokenError::Unexpected { source, .. } => *source = Some(Box::new(err)),
        }
        self
    }

    pub fn kind(&self) -> TokenErrorKind {
        match self {
            TokenError::NoCredentials { .. } => TokenErrorKind::NoCredentials,
            TokenError::Refresh { .. } => TokenErrorKind::Refresh,
            TokenError::Unexpected { .. } => TokenErrorKind::Unexpected,
        }
    }

    pub fn audience(&self) -> &str {
        match self {
            TokenError::NoCredentials { audience, .. }
            | TokenError::Refresh { audience, .. }
            | TokenError::Unexpected { audience, .. } => audience,
        }
    }
}

/// Source of identity tokens scoped to an audience.
///
/// Implementations make a single attempt per call and do not cache.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self, audience: &str) -> Result<BearerCredential, TokenError>;
}

/// Reject empty audiences before any identity source is consulted.
pub(crate) fn ensure_audience(audience: &str) -> Result<(), TokenError> {
    if audience.trim().is_empty() {
        return Err(TokenError::unexpected(audience, "audience must not be empty"));
    }
    Ok(())
}
