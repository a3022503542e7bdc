//! Server configuration module.
//!
//! Settings are read once at startup from an optional JSON settings file and then
//! overridden by environment variables.
//!
//! # Settings file
//!
//! `CHARGER_SETTINGS_FILE` names the file explicitly (it must then exist). Otherwise
//! `appsettings.json` in the working directory is used when present.
//!
//! ```json
//! {
//!   "projectId": "charger-prod",
//!   "credentialsFile": "/secrets/service-account.json",
//!   "jwt": { "issuer": "...", "audience": "...", "key": "...", "clockSkewSecs": 0 },
//!   "cors": { "allowedOrigins": ["http://localhost:3000"] },
//!   "realtime": { "path": "/chargerhub", "tokenQueryParameter": "access_token" }
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CHARGER_PROJECT_ID`: Project identifier (overrides `projectId`)
//! - `CHARGER_CREDENTIALS_FILE`: Credential file path (overrides `credentialsFile`)
//! - `CHARGER_JWT_ISSUER`, `CHARGER_JWT_AUDIENCE`, `CHARGER_JWT_KEY`: JWT settings
//! - `CHARGER_JWT_CLOCK_SKEW_SECS`: Allowed expiry skew in seconds (default: `0`)
//! - `CHARGER_CORS_ORIGINS`: Comma separated allowed origins
//! - `PORT`: Port to listen on (default: `8080`)
//!
//! # Invariants
//!
//! - Empty strings are treated as absent everywhere.
//! - `listen_port` is always in the range 1-65535.
//! - `realtime.path` starts with `/`, names at least one plain segment, and stays
//!   clear of `/health` and everything under `/api`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::credentials::DependencyKind;
use crate::environment::{self, EnvSource};

const SETTINGS_FILE_VAR: &str = "CHARGER_SETTINGS_FILE";
const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Route prefixes served by the API itself; the hub cannot live under them.
const RESERVED_ROUTE_PREFIXES: &[&str] = &["/health", "/api"];

/// Error returned when startup configuration is missing or invalid.
///
/// Always fatal: the process must not start listening after one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// One or more of the JWT issuer, audience or key are missing.
    MissingJwtSettings(Vec<&'static str>),
    /// Neither the configured nor the ambient project identifier is set.
    MissingProjectId(DependencyKind),
    /// No credential strategy could be satisfied.
    NoCredentials(DependencyKind),
    /// Credential material was found but cannot be used.
    InvalidCredentialMaterial {
        dependency: DependencyKind,
        message: String,
    },
    /// A setting has an invalid value.
    InvalidValue { name: String, message: String },
    /// The settings file cannot be read or parsed.
    SettingsFile { path: PathBuf, message: String },
    /// The shared HTTP client could not be constructed.
    HttpClient(String),
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSettings(fields) => {
                write!(f, "JWT configuration missing: {}", fields.join(", "))
            }
            Self::MissingProjectId(dependency) => {
                write!(f, "project identifier is not set for the {dependency}")
            }
            Self::NoCredentials(dependency) => {
                write!(f, "no credentials available for the {dependency}")
            }
            Self::InvalidCredentialMaterial {
                dependency,
                message,
            } => {
                write!(f, "invalid credential material for the {dependency}: {message}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
            Self::SettingsFile { path, message } => {
                write!(f, "cannot load settings file {}: {message}", path.display())
            }
            Self::HttpClient(message) => write!(f, "cannot build HTTP client: {message}"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// JWT validation settings as configured. Completeness is checked by
/// [`SigningConfig::from_settings`](crate::auth::SigningConfig::from_settings).
#[derive(Clone, Default)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub key: Option<String>,
    /// Tolerance applied to `exp` and `nbf`, in seconds.
    pub clock_skew_secs: u64,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("clock_skew_secs", &self.clock_skew_secs)
            .finish()
    }
}

/// Real-time endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSettings {
    /// Path prefix of the hub endpoint.
    pub path: String,
    /// Query parameter that may carry the bearer token on handshakes.
    pub token_query_parameter: String,
}

impl RealtimeSettings {
    /// Check that the hub path can be mounted next to the API routes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidValue` if the path is not absolute, is
    /// the bare root, contains anything but plain segments, or falls under a
    /// reserved API prefix.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_hub_path(&self.path)
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            path: Settings::DEFAULT_HUB_PATH.to_owned(),
            token_query_parameter: Settings::DEFAULT_TOKEN_QUERY_PARAMETER.to_owned(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Explicitly configured project identifier. Takes priority over the ambient one.
    pub project_id: Option<String>,
    /// Explicitly configured credential file. Takes priority over `GOOGLE_APPLICATION_CREDENTIALS`.
    pub credentials_file: Option<PathBuf>,
    pub jwt: JwtSettings,
    /// Origins allowed by the CORS policy.
    pub cors_allowed_origins: Vec<String>,
    pub realtime: RealtimeSettings,
    /// Port to listen on.
    pub listen_port: u16,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SettingsFile {
    project_id: Option<String>,
    credentials_file: Option<PathBuf>,
    jwt: JwtSection,
    cors: CorsSection,
    realtime: RealtimeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct JwtSection {
    issuer: Option<String>,
    audience: Option<String>,
    key: Option<String>,
    clock_skew_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CorsSection {
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RealtimeSection {
    path: Option<String>,
    token_query_parameter: Option<String>,
}

impl Settings {
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default hub endpoint path.
    pub const DEFAULT_HUB_PATH: &'static str = "/chargerhub";
    /// Default query parameter carrying a handshake token.
    pub const DEFAULT_TOKEN_QUERY_PARAMETER: &'static str = "access_token";
    /// Origins allowed when nothing is configured.
    pub const DEFAULT_CORS_ORIGINS: &'static [&'static str] = &["http://localhost:3000"];

    /// Load settings from the settings file (if any) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `CHARGER_SETTINGS_FILE` names a file that cannot be read
    /// - the settings file is not valid JSON of the expected shape
    /// - an environment override has an invalid value
    pub fn load(env: &dyn EnvSource) -> Result<Self, ConfigurationError> {
        let file = match Self::settings_file_path(env) {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(&path).map_err(|e| ConfigurationError::SettingsFile {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                tracing::debug!("loading settings from {}", path.display());
                Some(parse_settings_file(&path, &contents)?)
            }
            None => None,
        };
        Self::from_sources(file.unwrap_or_default(), env)
    }

    /// Load settings from a JSON document plus environment overrides.
    ///
    /// # Errors
    ///
    /// Same as [`Settings::load`], minus file access.
    pub fn from_json(json: &str, env: &dyn EnvSource) -> Result<Self, ConfigurationError> {
        let file = parse_settings_file(Path::new("<inline>"), json)?;
        Self::from_sources(file, env)
    }

    /// Load settings from the environment alone.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment override has an invalid value.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigurationError> {
        Self::from_sources(SettingsFile::default(), env)
    }

    fn settings_file_path(env: &dyn EnvSource) -> Option<PathBuf> {
        if let Some(path) = env.non_empty(SETTINGS_FILE_VAR) {
            return Some(PathBuf::from(path));
        }
        let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
        default.is_file().then_some(default)
    }

    fn from_sources(file: SettingsFile, env: &dyn EnvSource) -> Result<Self, ConfigurationError> {
        let jwt = JwtSettings {
            issuer: env
                .non_empty("CHARGER_JWT_ISSUER")
                .or_else(|| non_empty(file.jwt.issuer)),
            audience: env
                .non_empty("CHARGER_JWT_AUDIENCE")
                .or_else(|| non_empty(file.jwt.audience)),
            key: env
                .non_empty("CHARGER_JWT_KEY")
                .or_else(|| non_empty(file.jwt.key)),
            clock_skew_secs: match env.non_empty("CHARGER_JWT_CLOCK_SKEW_SECS") {
                Some(value) => value.parse().map_err(|_| ConfigurationError::InvalidValue {
                    name: "CHARGER_JWT_CLOCK_SKEW_SECS".to_owned(),
                    message: format!("'{value}' is not a number of seconds"),
                })?,
                None => file.jwt.clock_skew_secs.unwrap_or(0),
            },
        };

        let cors_allowed_origins = match env.non_empty("CHARGER_CORS_ORIGINS") {
            Some(value) => split_list(&value),
            None => file.cors.allowed_origins.unwrap_or_else(|| {
                Self::DEFAULT_CORS_ORIGINS
                    .iter()
                    .map(|origin| (*origin).to_owned())
                    .collect()
            }),
        };

        let defaults = RealtimeSettings::default();
        let realtime = RealtimeSettings {
            path: non_empty(file.realtime.path).unwrap_or(defaults.path),
            token_query_parameter: non_empty(file.realtime.token_query_parameter)
                .unwrap_or(defaults.token_query_parameter),
        };
        realtime.validate()?;

        Ok(Self {
            project_id: env
                .non_empty("CHARGER_PROJECT_ID")
                .or_else(|| non_empty(file.project_id)),
            credentials_file: env
                .non_empty("CHARGER_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .or_else(|| file.credentials_file.filter(|p| !p.as_os_str().is_empty())),
            jwt,
            cors_allowed_origins,
            realtime,
            listen_port: Self::load_listen_port(env)?,
        })
    }

    /// Load the listen port from environment.
    ///
    /// Returns the default if not set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is set but not a valid port number.
    fn load_listen_port(env: &dyn EnvSource) -> Result<u16, ConfigurationError> {
        match env.non_empty(environment::PORT) {
            Some(value) => value
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| ConfigurationError::InvalidValue {
                    name: environment::PORT.to_owned(),
                    message: format!("'{value}' is not a valid port number (must be 1-65535)"),
                }),
            None => Ok(Self::DEFAULT_PORT),
        }
    }
}

fn parse_settings_file(path: &Path, contents: &str) -> Result<SettingsFile, ConfigurationError> {
    serde_json::from_str(contents).map_err(|e| ConfigurationError::SettingsFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn validate_hub_path(path: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason: String| {
        Err(ConfigurationError::InvalidValue {
            name: "realtime.path".to_owned(),
            message: format!("'{path}' {reason}"),
        })
    };

    if !path.starts_with('/') {
        return invalid("must start with '/'".to_owned());
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return invalid("must name a path below '/'".to_owned());
    }
    let plain = trimmed[1..].split('/').all(|segment| {
        !matches!(segment, "" | "." | "..")
            && segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
    });
    if !plain {
        return invalid(
            "may only contain non-empty segments of letters, digits, '-', '_', '.' and '~'"
                .to_owned(),
        );
    }

    let lowered = trimmed.to_ascii_lowercase();
    if let Some(reserved) = RESERVED_ROUTE_PREFIXES.iter().find(|reserved| {
        lowered == **reserved
            || lowered
                .strip_prefix(**reserved)
                .is_some_and(|rest| rest.starts_with('/'))
    }) {
        return invalid(format!("collides with the reserved route prefix '{reserved}'"));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
