//! Identity provider handle and its once-only slot.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::DependencyError;
use super::token_source::AccessTokenProvider;
use crate::config::ConfigurationError;

const PRODUCTION_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";

/// A user known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "localId")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Handle to the identity provider's user-management surface.
pub struct IdentityProvider {
    http: reqwest::Client,
    tokens: AccessTokenProvider,
    project_id: String,
    project_url: String,
}

impl IdentityProvider {
    /// Create a handle. No connection is made until the first call.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: AccessTokenProvider,
        project_id: String,
        endpoint: Option<&str>,
    ) -> Self {
        let endpoint = endpoint.unwrap_or(PRODUCTION_ENDPOINT).trim_end_matches('/');
        let project_url = format!("{endpoint}/v1/projects/{project_id}");
        Self {
            http,
            tokens,
            project_id,
            project_url,
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub const fn tokens(&self) -> &AccessTokenProvider {
        &self.tokens
    }

    /// Look up a user by uid. Returns `None` if the provider does not know it.
    ///
    /// # Errors
    /// Returns `DependencyError` if the provider cannot be reached or refuses the call.
    pub async fn lookup_user(&self, uid: &str) -> Result<Option<UserRecord>, DependencyError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(format!("{}/accounts:lookup", self.project_url))
            .bearer_auth(token)
            .json(&json!({ "localId": [uid] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let lookup = response
            .json::<LookupResponse>()
            .await
            .map_err(|e| DependencyError::Decode(e.to_string()))?;
        Ok(lookup.users.into_iter().find(|user| user.uid == uid))
    }
}

/// Holds the process-wide identity provider.
///
/// Owned by the composition root. Initialization happens at most once; later
/// calls hand back the existing instance without running the initializer.
#[derive(Default)]
pub struct IdentityProviderSlot {
    provider: OnceLock<Arc<IdentityProvider>>,
}

impl IdentityProviderSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider, if initialized.
    #[must_use]
    pub fn get(&self) -> Option<Arc<IdentityProvider>> {
        self.provider.get().map(Arc::clone)
    }

    /// Return the provider, running `init` only if the slot is still empty.
    ///
    /// # Errors
    /// Propagates the error from `init`; the slot stays empty in that case.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<IdentityProvider>, ConfigurationError>
    where
        F: FnOnce() -> Result<IdentityProvider, ConfigurationError>,
    {
        if let Some(existing) = self.provider.get() {
            tracing::debug!("identity provider already initialized");
            return Ok(Arc::clone(existing));
        }
        let provider = Arc::new(init()?);
        // If another caller won the race, keep theirs.
        Ok(Arc::clone(self.provider.get_or_init(|| provider)))
    }
}
