//! Identity tokens from a service account key file.
//!
//! # Responsibilities
//! - Load the JSON key referenced by the credentials file setting
//! - Sign a self-issued RS256 assertion carrying the target audience
//! - Exchange the assertion for an identity token at the key's token URI
//!
//! # Security
//! - The private key is read per call and never logged or cached
//! - Only redacted token prefixes reach the logs

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::auth::token::{ensure_audience, redact, BearerCredential, TokenError, TokenProvider};

/// OAuth 2.0 grant type for JWT bearer assertions.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The fields of a service account JSON key this proxy needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Read and check a key file. Every failure here means there are no
    /// usable credentials.
    pub async fn load(path: &Path, audience: &str) -> Result<Self, TokenError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            TokenError::no_credentials(
                audience,
                format!("cannot read credentials file {}", path.display()),
            )
            .with_source(e)
        })?;

        let key: ServiceAccountKey = serde_json::from_str(&content).map_err(|e| {
            TokenError::no_credentials(
                audience,
                format!("credentials file {} is not a service account key", path.display()),
            )
            .with_source(e)
        })?;

        if key.kind != "service_account" {
            return Err(TokenError::no_credentials(
                audience,
                format!(
                    "credentials file {} has type '{}', expected 'service_account'",
                    path.display(),
                    key.kind
                ),
            ));
        }

        Ok(key)
    }

    /// Sign the assertion exchanged for an identity token.
    pub fn sign_assertion(&self, audience: &str, issued_at: i64) -> Result<String, TokenError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            sub: &self.client_email,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
            target_audience: audience,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            TokenError::unexpected(audience, "service account private key is not valid RSA PEM")
                .with_source(e)
        })?;

        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
            TokenError::unexpected(audience, "failed to sign token assertion").with_source(e)
        })
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    target_audience: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Mints identity tokens by exchanging a signed service account assertion.
#[derive(Clone)]
pub struct ServiceAccountTokenProvider {
    client: reqwest::Client,
    credentials_file: PathBuf,
    timeout: Duration,
}

impl ServiceAccountTokenProvider {
    pub fn new(client: reqwest::Client, credentials_file: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            credentials_file: credentials_file.into(),
            timeout,
        }
    }

    pub fn credentials_file(&self) -> &Path {
        &self.credentials_file
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn fetch(&self, audience: &str) -> Result<BearerCredential, TokenError> {
        ensure_audience(audience)?;

        let key = ServiceAccountKey::load(&self.credentials_file, audience).await?;
        let assertion = key.sign_assertion(audience, chrono::Utc::now().timestamp())?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                TokenError::refresh(audience, format!("token endpoint request failed: {}", e))
                    .with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::refresh(
                audience,
                format!("token endpoint returned {}: {}", status, body.trim()),
            ));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            TokenError::unexpected(audience, "token endpoint response is not valid JSON")
                .with_source(e)
        })?;

        let token = parsed
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TokenError::unexpected(audience, "token endpoint response has no id_token"))?;

        tracing::debug!(
            audience = %audience,
            client_email = %key.client_email,
            token = %redact(&token),
            "Fetched identity token with service account"
        );
        Ok(BearerCredential::new(token, audience))
    }
}
