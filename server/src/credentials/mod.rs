//! Credential resolution for the cloud dependencies.
//!
//! Each dependency (the document database and the identity provider) gets exactly one
//! [`ResolvedCredential`] per process, produced by [`CredentialChain::resolve`].
//!
//! # Invariants
//! - `ResolvedCredential::project_id` is never empty.
//! - Credential material never appears in `Debug` output.

mod chain;
pub mod service_account;
pub mod staging;

use std::path::PathBuf;

pub use chain::CredentialChain;
pub use service_account::ServiceAccountKey;

use crate::environment;

/// The cloud dependencies that need credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The document database.
    Database,
    /// The identity provider used to look up users.
    IdentityProvider,
}

impl DependencyKind {
    /// Environment variable that may hold inline service-account JSON for this dependency.
    #[must_use]
    pub const fn inline_credentials_var(self) -> &'static str {
        match self {
            Self::Database => environment::DATABASE_INLINE_CREDENTIALS,
            Self::IdentityProvider => environment::IDENTITY_INLINE_CREDENTIALS,
        }
    }

    /// Environment variable that may point the client at a local emulator.
    #[must_use]
    pub const fn emulator_host_var(self) -> &'static str {
        match self {
            Self::Database => environment::DATABASE_EMULATOR_HOST,
            Self::IdentityProvider => environment::IDENTITY_EMULATOR_HOST,
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "document database"),
            Self::IdentityProvider => write!(f, "identity provider"),
        }
    }
}

/// Where the credential material for a dependency comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// The hosting platform supplies the identity, nothing is read locally.
    AmbientServiceAccount,
    /// Service-account JSON held in an environment variable.
    InlineJsonMaterial(String),
    /// Service-account JSON stored in a file.
    FilePathMaterial(PathBuf),
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AmbientServiceAccount => write!(f, "AmbientServiceAccount"),
            Self::InlineJsonMaterial(_) => write!(f, "InlineJsonMaterial(<redacted>)"),
            Self::FilePathMaterial(path) => f.debug_tuple("FilePathMaterial").field(path).finish(),
        }
    }
}

/// A project identifier together with the selected credential source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub project_id: String,
    pub source: CredentialSource,
}
