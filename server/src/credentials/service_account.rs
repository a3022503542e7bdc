//! Service-account key material.

use std::path::Path;

use serde::Deserialize;

/// Token endpoint used when the key does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The parts of a service-account key file this server uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: Option<String>,
    pub project_id: Option<String>,
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the JSON is malformed, a required
    /// field is missing, or the key is not a service-account key.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let key: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if let Some(key_type) = &key.key_type
            && key_type != "service_account"
        {
            return Err(format!("expected a service_account key, found '{key_type}'"));
        }
        if key.client_email.is_empty() {
            return Err("client_email must not be empty".to_owned());
        }
        if key.private_key.is_empty() {
            return Err("private_key must not be empty".to_owned());
        }
        Ok(key)
    }

    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_json(&json)
    }
}
