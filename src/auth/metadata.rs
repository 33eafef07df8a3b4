//! Identity tokens from the compute metadata server.
//!
//! # Responsibilities
//! - Detect whether a metadata server is reachable
//! - Mint an identity token for the default service account

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::token::{ensure_audience, BearerCredential, TokenError, TokenProvider};

/// Header every metadata request and response must carry.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
pub const METADATA_FLAVOR_VALUE: &str = "Google";

const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Quick reachability probe timeout, independent of the fetch timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Fetches identity tokens for the instance's default service account.
#[derive(Clone)]
pub struct MetadataTokenProvider {
    client: reqwest::Client,
    host: String,
    timeout: Duration,
}

impl MetadataTokenProvider {
    /// `host` is a host[:port]; a full `http://` base URL is accepted as well.
    pub fn new(client: reqwest::Client, host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            host: host.into(),
            timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    /// Returns true if a metadata server answers at the configured host.
    pub async fn is_available(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/", self.base_url()))
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => response
                .headers()
                .get(METADATA_FLAVOR_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == METADATA_FLAVOR_VALUE),
            Err(e) => {
                tracing::debug!(host = %self.host, error = %e, "Metadata server probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn fetch(&self, audience: &str) -> Result<BearerCredential, TokenError> {
        ensure_audience(audience)?;

        let url = format!("{}{}", self.base_url(), IDENTITY_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("audience", audience), ("format", "full")])
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                TokenError::refresh(audience, format!("metadata server request failed: {}", e))
                    .with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TokenError::refresh(audience, "failed to read metadata server response").with_source(e)
        })?;

        if !status.is_success() {
            return Err(TokenError::refresh(
                audience,
                format!("metadata server returned {}: {}", status, body.trim()),
            ));
        }

        let token = body.trim();
        if token.is_empty() {
            return Err(TokenError::unexpected(
                audience,
                "metadata server returned an empty token",
            ));
        }

        tracing::debug!(audience = %audience, "Fetched identity token from metadata server");
        Ok(BearerCredential::new(token, audience))
    }
}
