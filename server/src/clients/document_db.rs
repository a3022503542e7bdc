//! Document database handle.
//!
//! A thin client for the document REST surface. One instance exists per process and
//! is shared by every request handler.

use reqwest::StatusCode;
use serde_json::{Value, json};

use super::DependencyError;
use super::token_source::AccessTokenProvider;

const PRODUCTION_ENDPOINT: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";

/// A document address confined to one collection level below the documents root.
///
/// # Invariants
/// - Both segments are non-empty, are not `.` or `..`, and consist only of ASCII
///   letters, digits, `-`, `_`, `.` and `~`. They need no escaping and cannot
///   leave the documents root once joined into a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    /// Returns `None` if either segment is not a plain path segment.
    #[must_use]
    pub fn new(collection: &str, id: &str) -> Option<Self> {
        (is_plain_segment(collection) && is_plain_segment(id)).then(|| Self {
            collection: collection.to_owned(),
            id: id.to_owned(),
        })
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
}

/// Handle to the project's default document database.
pub struct DocumentDatabase {
    http: reqwest::Client,
    tokens: AccessTokenProvider,
    project_id: String,
    documents_url: String,
}

impl DocumentDatabase {
    /// Create a handle. No connection is made until the first call.
    ///
    /// `endpoint` overrides the production endpoint, e.g. `http://localhost:8080`
    /// for an emulator.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: AccessTokenProvider,
        project_id: String,
        endpoint: Option<&str>,
    ) -> Self {
        let endpoint = endpoint.unwrap_or(PRODUCTION_ENDPOINT).trim_end_matches('/');
        let documents_url =
            format!("{endpoint}/v1/projects/{project_id}/databases/{DEFAULT_DATABASE}/documents");
        Self {
            http,
            tokens,
            project_id,
            documents_url,
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

    /// URL of a single document.
    #[must_use]
    pub fn document_url(&self, path: &DocumentPath) -> String {
        format!("{}/{}/{}", self.documents_url, path.collection, path.id)
    }

    /// Fetch a document. Returns `None` if it does not exist.
    ///
    /// # Errors
    /// Returns `DependencyError` if the database cannot be reached or refuses the call.
    pub async fn get_document(&self, path: &DocumentPath) -> Result<Option<Value>, DependencyError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.document_url(path))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|e| DependencyError::Decode(e.to_string())),
            status => Err(DependencyError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Create or replace a document with the given typed fields.
    ///
    /// `fields` uses the REST value encoding, e.g. `{"name": {"stringValue": "x"}}`.
    ///
    /// # Errors
    /// Returns `DependencyError` if the database cannot be reached or refuses the write.
    pub async fn set_document(
        &self,
        path: &DocumentPath,
        fields: Value,
    ) -> Result<Value, DependencyError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .patch(self.document_url(path))
            .bearer_auth(token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DependencyError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| DependencyError::Decode(e.to_string()))
    }
}
