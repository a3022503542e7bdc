//! Long-lived handles to the cloud dependencies.
//!
//! [`ServiceClientFactory`] turns a [`ResolvedCredential`] into a handle. Building a
//! handle reads local key material when the credential points at some, but never
//! performs a network round trip: tokens and connections are acquired on first use.
//!
//! # Invariants
//! - One handle per dependency per process, shared read-only by all requests.
//! - Handles are internally synchronized; callers need no extra locking.

pub mod document_db;
pub mod identity;
pub mod token_source;

use std::path::PathBuf;

pub use document_db::{DocumentDatabase, DocumentPath};
pub use identity::{IdentityProvider, IdentityProviderSlot, UserRecord};
pub use token_source::{AccessTokenProvider, TokenSource};

use crate::config::ConfigurationError;
use crate::credentials::{
    CredentialSource, DependencyKind, ResolvedCredential, ServiceAccountKey, staging,
};
use crate::environment::EnvSource;

/// A cloud dependency failed after startup.
///
/// Never handled here; application services decide what to do with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// The dependency could not be reached.
    Network(String),
    /// The dependency answered with a non-success status.
    Status { status: u16, message: String },
    /// An access token could not be produced.
    Token(String),
    /// The response could not be decoded.
    Decode(String),
}

impl std::fmt::Display for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "dependency unreachable: {message}"),
            Self::Status { status, message } => {
                write!(f, "dependency returned status {status}: {message}")
            }
            Self::Token(message) => write!(f, "cannot obtain access token: {message}"),
            Self::Decode(message) => write!(f, "cannot decode dependency response: {message}"),
        }
    }
}

impl std::error::Error for DependencyError {}

impl From<reqwest::Error> for DependencyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Emulator hosts that redirect a client away from production.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmulatorHosts {
    pub database: Option<String>,
    pub identity: Option<String>,
}

impl EmulatorHosts {
    #[must_use]
    pub fn from_env(env: &dyn EnvSource) -> Self {
        Self {
            database: env.non_empty(DependencyKind::Database.emulator_host_var()),
            identity: env.non_empty(DependencyKind::IdentityProvider.emulator_host_var()),
        }
    }

    const fn host(&self, kind: DependencyKind) -> Option<&String> {
        match kind {
            DependencyKind::Database => self.database.as_ref(),
            DependencyKind::IdentityProvider => self.identity.as_ref(),
        }
    }
}

/// Builds the dependency handles from resolved credentials.
pub struct ServiceClientFactory {
    http: reqwest::Client,
    staging_dir: PathBuf,
    emulators: EmulatorHosts,
}

impl ServiceClientFactory {
    /// `staging_dir` receives inline database credentials that must live on disk.
    ///
    /// # Errors
    /// Returns `ConfigurationError::HttpClient` if the HTTP client cannot be built.
    pub fn new(staging_dir: PathBuf, emulators: EmulatorHosts) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("charger-hub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            staging_dir,
            emulators,
        })
    }

    /// Build the document database handle.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the credential material cannot be staged or used.
    pub fn build_database(
        &self,
        credential: &ResolvedCredential,
    ) -> Result<DocumentDatabase, ConfigurationError> {
        let kind = DependencyKind::Database;
        let source = self.token_source(kind, credential)?;
        let endpoint = self.emulators.host(kind).map(|host| format!("http://{host}"));
        tracing::info!(
            project_id = %credential.project_id,
            tokens = source.kind(),
            "document database client ready"
        );
        Ok(DocumentDatabase::new(
            self.http.clone(),
            AccessTokenProvider::new(self.http.clone(), source),
            credential.project_id.clone(),
            endpoint.as_deref(),
        ))
    }

    /// Build the identity provider handle.
    ///
    /// # Errors
    /// Returns `ConfigurationError` if the credential material cannot be used.
    pub fn build_identity_provider(
        &self,
        credential: &ResolvedCredential,
    ) -> Result<IdentityProvider, ConfigurationError> {
        let kind = DependencyKind::IdentityProvider;
        let source = self.token_source(kind, credential)?;
        let endpoint = self
            .emulators
            .host(kind)
            .map(|host| format!("http://{host}/identitytoolkit.googleapis.com"));
        tracing::info!(
            project_id = %credential.project_id,
            tokens = source.kind(),
            "identity provider client ready"
        );
        Ok(IdentityProvider::new(
            self.http.clone(),
            AccessTokenProvider::new(self.http.clone(), source),
            credential.project_id.clone(),
            endpoint.as_deref(),
        ))
    }

    fn token_source(
        &self,
        kind: DependencyKind,
        credential: &ResolvedCredential,
    ) -> Result<TokenSource, ConfigurationError> {
        if self.emulators.host(kind).is_some() {
            return Ok(TokenSource::Emulator);
        }

        let invalid = |message: String| ConfigurationError::InvalidCredentialMaterial {
            dependency: kind,
            message,
        };
        let key = match &credential.source {
            CredentialSource::AmbientServiceAccount => return Ok(TokenSource::Metadata),
            CredentialSource::InlineJsonMaterial(json) => match kind {
                // The database client only loads keys from disk.
                DependencyKind::Database => {
                    let path = staging::stage_inline_material(json, &self.staging_dir)
                        .map_err(|e| invalid(format!("cannot stage inline credentials: {e}")))?;
                    ServiceAccountKey::from_file(&path)
                }
                DependencyKind::IdentityProvider => ServiceAccountKey::from_json(json),
            },
            CredentialSource::FilePathMaterial(path) => ServiceAccountKey::from_file(path),
        }
        .map_err(invalid)?;

        TokenSource::service_account(key).map_err(invalid)
    }
}
