//! OAuth access tokens for the cloud REST surfaces.
//!
//! Tokens are fetched lazily on first use and cached until shortly before they
//! expire. Constructing a provider never touches the network.
//!
//! # Invariants
//! - A cached token is handed out only while it has more than 60 seconds left.
//! - A response without `expires_in` is treated as valid for one hour.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::DependencyError;
use crate::credentials::ServiceAccountKey;
use crate::time::{SystemTimeSource, TimeSource};

/// Scope requested for every token.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
/// Metadata server endpoint for the ambient service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// Token accepted by the local emulators.
pub const EMULATOR_TOKEN: &str = "owner";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
/// Refresh this long before the cached token expires.
const REFRESH_MARGIN_SECS: u64 = 60;

/// How access tokens are obtained.
pub enum TokenSource {
    /// Ask the platform's metadata server.
    Metadata,
    /// Exchange a signed assertion for a token at the key's token endpoint.
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
    },
    /// Local emulator, no real token needed.
    Emulator,
}

impl TokenSource {
    /// Build a service-account source, validating the private key up front.
    ///
    /// # Errors
    /// Returns a description of the problem if the private key is not an RSA PEM key.
    pub fn service_account(key: ServiceAccountKey) -> Result<Self, String> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| format!("private_key is not a usable RSA key: {e}"))?;
        Ok(Self::ServiceAccount { key, signing_key })
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::ServiceAccount { .. } => "service-account",
            Self::Emulator => "emulator",
        }
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Hands out bearer tokens for one dependency. Safe to share between requests.
pub struct AccessTokenProvider {
    http: reqwest::Client,
    source: TokenSource,
    metadata_url: String,
    clock: Box<dyn TimeSource>,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, source: TokenSource) -> Self {
        Self::with_time_source(http, source, SystemTimeSource)
    }

    /// Create a provider that reads token lifetimes against `clock`.
    #[must_use]
    pub fn with_time_source(
        http: reqwest::Client,
        source: TokenSource,
        clock: impl TimeSource + 'static,
    ) -> Self {
        Self {
            http,
            source,
            metadata_url: METADATA_TOKEN_URL.to_owned(),
            clock: Box::new(clock),
            cached: Mutex::new(None),
        }
    }

    /// Ask `url` instead of the platform metadata server.
    #[must_use]
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    #[must_use]
    pub const fn source(&self) -> &TokenSource {
        &self.source
    }

    /// Current bearer token, fetching a new one if none is cached or it is about to expire.
    ///
    /// # Errors
    /// Returns `DependencyError` if the token endpoint cannot be reached or refuses.
    pub async fn access_token(&self) -> Result<String, DependencyError> {
        if matches!(self.source, TokenSource::Emulator) {
            return Ok(EMULATOR_TOKEN.to_owned());
        }

        let mut cached = self.cached.lock().await;
        let now = self.clock.now_secs();
        if let Some(token) = cached.as_ref()
            && token.expires_at > now.saturating_add(REFRESH_MARGIN_SECS)
        {
            return Ok(token.value.clone());
        }

        let response = self.fetch(now).await?;
        let value = response.access_token.clone();
        *cached = Some(CachedToken {
            value: response.access_token,
            expires_at: now.saturating_add(response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        });
        tracing::debug!(source = self.source.kind(), "refreshed access token");
        Ok(value)
    }

    async fn fetch(&self, now: u64) -> Result<TokenResponse, DependencyError> {
        let request = match &self.source {
            TokenSource::Metadata => self
                .http
                .get(&self.metadata_url)
                .header("Metadata-Flavor", "Google"),
            TokenSource::ServiceAccount { key, signing_key } => {
                let assertion = sign_assertion(key, signing_key, now)?;
                self.http
                    .post(&key.token_uri)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            }
            TokenSource::Emulator => {
                return Ok(TokenResponse {
                    access_token: EMULATOR_TOKEN.to_owned(),
                    expires_in: None,
                });
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DependencyError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| DependencyError::Decode(e.to_string()))
    }
}

fn sign_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    now: u64,
) -> Result<String, DependencyError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid.clone_from(&key.private_key_id);
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    encode(&header, &claims, signing_key).map_err(|e| DependencyError::Token(e.to_string()))
}
