//! Application-default identity source selection.

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::metadata::MetadataTokenProvider;
use crate::auth::service_account::ServiceAccountTokenProvider;
use crate::auth::token::{ensure_audience, BearerCredential, TokenError, TokenProvider};
use crate::config::AuthConfig;

/// Resolves the ambient identity source on every call.
///
/// A configured credentials file wins; otherwise the metadata server is used
/// if it answers the probe. With neither, the fetch fails with
/// `NoCredentials`.
pub struct AmbientTokenProvider {
    service_account: Option<ServiceAccountTokenProvider>,
    metadata: MetadataTokenProvider,
}

impl AmbientTokenProvider {
    pub fn new(client: reqwest::Client, config: &AuthConfig) -> Self {
        let timeout: Duration = config.timeout();
        Self {
            service_account: config
                .credentials_file
                .as_ref()
                .map(|path| ServiceAccountTokenProvider::new(client.clone(), path.clone(), timeout)),
            metadata: MetadataTokenProvider::new(client, config.metadata_host.clone(), timeout),
        }
    }
}

#[async_trait]
impl TokenProvider for AmbientTokenProvider {
    async fn fetch(&self, audience: &str) -> Result<BearerCredential, TokenError> {
        ensure_audience(audience)?;

        if let Some(service_account) = &self.service_account {
            tracing::debug!(
                credentials_file = %service_account.credentials_file().display(),
                "Using service account credentials"
            );
            return service_account.fetch(audience).await;
        }

        if self.metadata.is_available().await {
            tracing::debug!(host = %self.metadata.host(), "Using metadata server credentials");
            return self.metadata.fetch(audience).await;
        }

        Err(TokenError::no_credentials(
            audience,
            format!(
                "no credentials file configured and no metadata server at {}",
                self.metadata.host()
            ),
        ))
    }
}
