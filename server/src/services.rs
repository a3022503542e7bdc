//! Application services registered as process-wide singletons.
//!
//! Each service holds only an already-built client handle or its own channel. No
//! service reaches into another's state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::clients::{DependencyError, DocumentDatabase, DocumentPath, IdentityProvider, UserRecord};

/// Buffered hub events per subscriber before it starts lagging.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Reads and writes documents on behalf of request handlers.
pub struct DocumentService {
    database: Arc<DocumentDatabase>,
}

impl DocumentService {
    #[must_use]
    pub const fn new(database: Arc<DocumentDatabase>) -> Self {
        Self { database }
    }

    /// # Errors
    /// Returns `DependencyError` if the database call fails.
    pub async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, DependencyError> {
        self.database.get_document(path).await
    }

    /// # Errors
    /// Returns `DependencyError` if the database call fails.
    pub async fn put(&self, path: &DocumentPath, fields: Value) -> Result<Value, DependencyError> {
        self.database.set_document(path, fields).await
    }
}

/// User lookups against the identity provider.
pub struct IdentityService {
    provider: Arc<IdentityProvider>,
}

impl IdentityService {
    #[must_use]
    pub const fn new(provider: Arc<IdentityProvider>) -> Self {
        Self { provider }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<IdentityProvider> {
        &self.provider
    }

    /// # Errors
    /// Returns `DependencyError` if the provider call fails.
    pub async fn user(&self, uid: &str) -> Result<Option<UserRecord>, DependencyError> {
        self.provider.lookup_user(uid).await
    }
}

/// An event pushed to every connected hub client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Fan-out of hub events to live connections.
pub struct NotificationService {
    sender: broadcast::Sender<HubEvent>,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(NOTIFICATION_CHANNEL_CAPACITY)
    }
}

impl NotificationService {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: HubEvent) -> usize {
        // No subscribers is not an error.
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Everything request handlers need, cloned cheaply into each handler.
#[derive(Clone)]
pub struct AppServices {
    pub documents: Arc<DocumentService>,
    pub identity: Arc<IdentityService>,
    pub notifications: Arc<NotificationService>,
}
