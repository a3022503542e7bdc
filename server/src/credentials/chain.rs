//! Ordered credential strategies.
//!
//! Strategies are evaluated in a fixed priority order. Each one is a predicate
//! (does it apply in this environment?) paired with a constructor (build the
//! credential source). The first constructor that succeeds wins; a constructor
//! failure is logged and the next strategy is tried. Nothing else in the process
//! absorbs a failure this way.

use std::path::{Path, PathBuf};

use super::{CredentialSource, DependencyKind, ResolvedCredential};
use crate::config::ConfigurationError;
use crate::environment::{self, EnvSource, RuntimeEnvironment};

/// Inputs visible to a strategy.
struct ResolutionInput<'a> {
    kind: DependencyKind,
    runtime: RuntimeEnvironment,
    env: &'a dyn EnvSource,
    configured_file: Option<&'a Path>,
}

struct Strategy {
    name: &'static str,
    applies: fn(&ResolutionInput<'_>) -> bool,
    select: fn(&ResolutionInput<'_>) -> Result<CredentialSource, String>,
}

const STRATEGIES: [Strategy; 4] = [
    Strategy {
        name: "ambient service account",
        applies: |input| input.runtime == RuntimeEnvironment::Managed,
        select: |_| Ok(CredentialSource::AmbientServiceAccount),
    },
    Strategy {
        name: "inline service-account JSON",
        applies: |input| input.env.non_empty(input.kind.inline_credentials_var()).is_some(),
        select: select_inline_material,
    },
    Strategy {
        name: "configured credential file",
        applies: |input| input.configured_file.is_some(),
        select: |input| match input.configured_file {
            Some(path) => select_file(path),
            None => Err("no credential file configured".to_owned()),
        },
    },
    Strategy {
        name: "credential file from environment",
        applies: |input| input.env.non_empty(environment::CREDENTIALS_FILE).is_some(),
        select: |input| match input.env.non_empty(environment::CREDENTIALS_FILE) {
            Some(path) => select_file(Path::new(&path)),
            None => Err(format!("{} is not set", environment::CREDENTIALS_FILE)),
        },
    },
];

fn select_inline_material(input: &ResolutionInput<'_>) -> Result<CredentialSource, String> {
    let var = input.kind.inline_credentials_var();
    let material = input
        .env
        .non_empty(var)
        .ok_or_else(|| format!("{var} is not set"))?;
    match serde_json::from_str::<serde_json::Value>(&material) {
        Ok(serde_json::Value::Object(_)) => Ok(CredentialSource::InlineJsonMaterial(material)),
        Ok(_) => Err(format!("{var} does not hold a JSON object")),
        Err(e) => Err(format!("{var} is not valid JSON: {e}")),
    }
}

fn select_file(path: &Path) -> Result<CredentialSource, String> {
    if path.is_file() {
        Ok(CredentialSource::FilePathMaterial(PathBuf::from(path)))
    } else {
        Err(format!("{} is not a readable file", path.display()))
    }
}

/// Resolves credentials for a dependency against one environment snapshot.
pub struct CredentialChain<'a> {
    env: &'a dyn EnvSource,
    runtime: RuntimeEnvironment,
    configured_project_id: Option<&'a str>,
    configured_file: Option<&'a Path>,
}

impl<'a> CredentialChain<'a> {
    #[must_use]
    pub fn new(
        env: &'a dyn EnvSource,
        runtime: RuntimeEnvironment,
        configured_project_id: Option<&'a str>,
        configured_file: Option<&'a Path>,
    ) -> Self {
        Self {
            env,
            runtime,
            configured_project_id: configured_project_id.filter(|id| !id.is_empty()),
            configured_file,
        }
    }

    /// Resolve the project identifier and credential source for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::MissingProjectId` if neither the configured nor the
    /// ambient project identifier is set, and `ConfigurationError::NoCredentials` if no
    /// strategy produced a credential source.
    pub fn resolve(&self, kind: DependencyKind) -> Result<ResolvedCredential, ConfigurationError> {
        let project_id = self.project_id(kind)?;
        let input = ResolutionInput {
            kind,
            runtime: self.runtime,
            env: self.env,
            configured_file: self.configured_file,
        };

        for strategy in &STRATEGIES {
            if !(strategy.applies)(&input) {
                continue;
            }
            match (strategy.select)(&input) {
                Ok(source) => {
                    tracing::info!(
                        dependency = %kind,
                        project_id = %project_id,
                        "credentials resolved via {}",
                        strategy.name
                    );
                    return Ok(ResolvedCredential { project_id, source });
                }
                Err(reason) => {
                    tracing::warn!(dependency = %kind, "skipping {}: {reason}", strategy.name);
                }
            }
        }

        Err(ConfigurationError::NoCredentials(kind))
    }

    fn project_id(&self, kind: DependencyKind) -> Result<String, ConfigurationError> {
        self.configured_project_id
            .map(str::to_owned)
            .or_else(|| self.env.non_empty(environment::AMBIENT_PROJECT))
            .ok_or(ConfigurationError::MissingProjectId(kind))
    }
}
