//! Bearer token validation.
//!
//! Verifies HS256 JSON Web Tokens against the single configured key and checks the
//! issuer, audience and lifetime claims.
//!
//! # Pre-conditions
//! - The `SigningConfig` is complete (see `SigningConfig::from_settings`).
//!
//! # Post-conditions
//! - On success, returns the `Principal` described by the token's claims.
//! - On failure, returns an `AuthError` naming the failed dimension.
//!
//! # Invariants
//! - Validation is stateless; the result depends only on the token, the signing
//!   configuration and the evaluation time.
//! - The signature is verified before any claim is trusted.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::SigningConfig;
use crate::time::{SystemTimeSource, TimeSource};

/// Registered claims the gate inspects; everything else is carried through.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    iss: String,
    exp: u64,
    nbf: Option<u64>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    /// The `sub` claim, when present.
    pub subject: Option<String>,
    pub issuer: String,
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
    /// Remaining claims, including `aud`.
    pub claims: Map<String, Value>,
}

/// Why a credential was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// No credential was presented.
    MissingCredential,
    /// The token is malformed or cannot be parsed.
    MalformedToken,
    /// The token signature is invalid.
    InvalidSignature,
    /// The `iss` claim does not match.
    InvalidIssuer,
    /// The `aud` claim does not match.
    InvalidAudience,
    /// The token has expired.
    TokenExpired,
    /// The token's `nbf` is in the future.
    NotYetValid,
    /// A required claim is missing.
    MissingClaim(String),
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "no credential presented"),
            Self::MalformedToken => write!(f, "malformed JWT"),
            Self::InvalidSignature => write!(f, "invalid JWT signature"),
            Self::InvalidIssuer => write!(f, "unexpected issuer"),
            Self::InvalidAudience => write!(f, "unexpected audience"),
            Self::TokenExpired => write!(f, "JWT has expired"),
            Self::NotYetValid => write!(f, "JWT is not valid yet"),
            Self::MissingClaim(claim) => write!(f, "missing '{claim}' claim in JWT"),
        }
    }
}

/// Error returned when a credential does not authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub reason: AuthFailure,
}

impl From<AuthFailure> for AuthError {
    fn from(reason: AuthFailure) -> Self {
        Self { reason }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unauthorized: {}", self.reason)
    }
}

impl std::error::Error for AuthError {}

/// Validates bearer tokens against one `SigningConfig`.
pub struct AuthenticationGate {
    config: SigningConfig,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Box<dyn TimeSource>,
}

impl AuthenticationGate {
    #[must_use]
    pub fn new(config: SigningConfig) -> Self {
        Self::with_time_source(config, SystemTimeSource)
    }

    /// Gate whose `validate` reads the current time from `clock`.
    #[must_use]
    pub fn with_time_source(config: SigningConfig, clock: impl TimeSource + 'static) -> Self {
        let decoding_key = DecodingKey::from_secret(config.key.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Lifetime is checked in `validate_at` against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;

        Self {
            config,
            decoding_key,
            validation,
            clock: Box::new(clock),
        }
    }

    /// Validate `token` against the gate's clock.
    ///
    /// # Errors
    /// Returns `AuthError` if any validation dimension fails.
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        self.validate_at(token, self.clock.now_secs())
    }

    /// Validate `token` as of `now` (seconds since the Unix epoch).
    ///
    /// # Errors
    /// Returns `AuthError` if any validation dimension fails.
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Principal, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(map_jwt_error)?
            .claims;

        let skew = self.config.clock_skew_secs;
        if claims.exp.saturating_add(skew) <= now {
            return Err(AuthFailure::TokenExpired.into());
        }
        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(skew)
        {
            return Err(AuthFailure::NotYetValid.into());
        }

        Ok(Principal {
            subject: claims.sub.filter(|sub| !sub.is_empty()),
            issuer: claims.iss,
            expires_at: claims.exp,
            claims: claims.other,
        })
    }
}

/// Maps jsonwebtoken errors to our `AuthError` type.
fn map_jwt_error(error: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    let reason = match error.kind() {
        ErrorKind::InvalidSignature => AuthFailure::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthFailure::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthFailure::InvalidAudience,
        ErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
        ErrorKind::ImmatureSignature => AuthFailure::NotYetValid,
        ErrorKind::MissingRequiredClaim(claim) => AuthFailure::MissingClaim(claim.clone()),
        _ => AuthFailure::MalformedToken,
    };
    reason.into()
}
