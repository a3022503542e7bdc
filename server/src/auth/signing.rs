//! Token signing configuration.
//!
//! # Pre-conditions
//! - Issuer, audience and key must all be configured and non-empty.
//!
//! # Post-conditions
//! - `SigningConfig` instances are immutable once created.
//!
//! # Invariants
//! - The key is never empty and never appears in `Debug` output.

use crate::config::{ConfigurationError, JwtSettings};

/// Symmetric key used to verify HS256 signatures.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

/// Everything the authentication gate needs to validate a token.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    pub key: SigningKey,
    /// Tolerance in seconds applied to `exp` and `nbf`.
    pub clock_skew_secs: u64,
}

impl SigningConfig {
    /// Build a signing configuration from settings.
    ///
    /// The key is the UTF-8 encoding of the configured string.
    ///
    /// # Errors
    /// Returns `ConfigurationError::MissingJwtSettings` naming every missing field.
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, ConfigurationError> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());

        let missing: Vec<&'static str> = [
            ("issuer", present(&settings.issuer)),
            ("audience", present(&settings.audience)),
            ("key", present(&settings.key)),
        ]
        .into_iter()
        .filter_map(|(name, ok)| (!ok).then_some(name))
        .collect();

        match (&settings.issuer, &settings.audience, &settings.key) {
            (Some(issuer), Some(audience), Some(key)) if missing.is_empty() => Ok(Self {
                issuer: issuer.clone(),
                audience: audience.clone(),
                key: SigningKey(key.as_bytes().to_vec()),
                clock_skew_secs: settings.clock_skew_secs,
            }),
            _ => Err(ConfigurationError::MissingJwtSettings(missing)),
        }
    }
}
