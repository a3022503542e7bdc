//! Query-parameter token relocation for real-time handshakes.
//!
//! Browsers cannot attach an `Authorization` header to a WebSocket handshake, so
//! clients of the hub send the bearer token as a query parameter instead. The bridge
//! lifts that value into the credential slot read by the authentication middleware,
//! but only for paths under the configured real-time prefixes.
//!
//! # Invariants
//! - Paths are matched segment-wise and case-insensitively: `/chargerhub` matches
//!   `/chargerhub` and `/chargerhub/negotiate`, never `/chargerhubs`.
//! - When the parameter repeats, only the first occurrence is considered.
//! - A prefix that is empty once its trailing `/` is removed matches nothing.

/// A bearer token lifted out of a handshake's query string.
///
/// Lives in the request extensions for the duration of one request.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgedToken(pub String);

impl std::fmt::Debug for BridgedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BridgedToken(<redacted>)")
    }
}

/// Relocates handshake query tokens for a set of path prefixes.
#[derive(Debug, Clone)]
pub struct TokenBridge {
    prefixes: Vec<String>,
    parameter: String,
}

impl TokenBridge {
    /// Create a bridge for `prefixes` reading the token from `parameter`.
    #[must_use]
    pub fn new<I, S>(prefixes: I, parameter: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|prefix| prefix.as_ref().trim_end_matches('/').to_owned())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
            parameter: parameter.into(),
        }
    }

    /// Whether `path` lies under one of the configured prefixes.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
                && matches!(path.as_bytes().get(prefix.len()), None | Some(b'/'))
        })
    }

    /// The token to relocate for a request to `path` with query string `query`, if any.
    ///
    /// Returns `None` when the path is out of scope, the parameter is absent, or its
    /// first occurrence is empty.
    #[must_use]
    pub fn extract(&self, path: &str, query: Option<&str>) -> Option<BridgedToken> {
        if !self.matches_path(path) {
            return None;
        }
        let query = query?;
        let (_, value) = url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == self.parameter.as_str())?;
        (!value.is_empty()).then(|| BridgedToken(value.into_owned()))
    }
}
