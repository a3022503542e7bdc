//! Process environment access and runtime detection.
//!
//! Everything that reads environment variables goes through [`EnvSource`] so that
//! credential resolution and settings loading can be exercised against an injected
//! map instead of the real process environment.
//!
//! # Invariants
//!
//! - [`RuntimeEnvironment`] is detected once at startup and never changes afterwards.
//! - Empty values are treated as absent by [`EnvSource::non_empty`].

use std::collections::HashMap;

/// Platform marker. Its presence means the process runs on the managed platform.
pub const PLATFORM_MARKER: &str = "K_SERVICE";
/// Project identifier supplied ambiently by the platform.
pub const AMBIENT_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Inline service-account JSON for the document database.
pub const DATABASE_INLINE_CREDENTIALS: &str = "GOOGLE_SERVICE_ACCOUNT";
/// Inline service-account JSON for the identity provider.
pub const IDENTITY_INLINE_CREDENTIALS: &str = "FIREBASE_SERVICE_ACCOUNT";
/// Path to a local credential file.
pub const CREDENTIALS_FILE: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Listening port assigned by the platform.
pub const PORT: &str = "PORT";
/// Host of a local document database emulator.
pub const DATABASE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
/// Host of a local identity provider emulator.
pub const IDENTITY_EMULATOR_HOST: &str = "FIREBASE_AUTH_EMULATOR_HOST";

/// Read-only view of environment variables.
pub trait EnvSource: Send + Sync {
    /// Returns the raw value of `name`, or `None` if unset or not valid unicode.
    fn var(&self, name: &str) -> Option<String>;

    /// Returns the value of `name` only if it is set and non-empty.
    fn non_empty(&self, name: &str) -> Option<String> {
        self.var(name).filter(|value| !value.is_empty())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables, used where the process environment must not leak in.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_owned(), value.to_owned());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Where the process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Hosted on a platform that supplies service identity ambiently.
    Managed,
    /// Developer machine or CI, explicit credential material required.
    Local,
}

impl RuntimeEnvironment {
    /// Detect the runtime from the platform marker.
    ///
    /// Presence of the marker is enough, its value is not inspected.
    #[must_use]
    pub fn detect(env: &dyn EnvSource) -> Self {
        if env.var(PLATFORM_MARKER).is_some() {
            Self::Managed
        } else {
            Self::Local
        }
    }
}

impl std::fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Managed => write!(f, "managed"),
            Self::Local => write!(f, "local"),
        }
    }
}
