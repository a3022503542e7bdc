//! HTTP surface.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthenticationGate, Principal, TokenBridge, middleware};
use crate::clients::{DependencyError, DocumentPath, UserRecord};
use crate::hub;
use crate::services::{AppServices, HubEvent};

/// Failure of an authenticated API call.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound,
    Dependency(DependencyError),
}

impl From<DependencyError> for ApiError {
    fn from(e: DependencyError) -> Self {
        Self::Dependency(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            Self::Dependency(e) => {
                tracing::warn!("dependency call failed: {e}");
                (StatusCode::BAD_GATEWAY, "dependency unavailable").into_response()
            }
        }
    }
}

/// Assemble the application router.
///
/// Layers run outermost first: CORS, tracing, the query-token bridge, then
/// authentication on every route except `/health`.
///
/// Document writes use POST so browser callers stay inside the CORS method list.
pub fn router(
    services: AppServices,
    gate: Arc<AuthenticationGate>,
    bridge: Arc<TokenBridge>,
    cors: CorsLayer,
    hub_path: &str,
) -> Router {
    let protected = Router::new()
        .route("/api/me", get(me))
        .route("/api/users/me", get(current_user))
        .route(
            "/api/documents/{collection}/{id}",
            get(document).post(write_document),
        )
        .route("/api/notifications", post(notify))
        .route(hub_path, get(hub::connect))
        .route_layer(from_fn_with_state(gate, middleware::authenticate));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(services)
        .layer(from_fn_with_state(bridge, middleware::bridge_query_token))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

async fn current_user(
    State(services): State<AppServices>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserRecord>, ApiError> {
    let uid = principal.subject.ok_or(ApiError::NotFound)?;
    services
        .identity
        .user(&uid)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

fn document_path(collection: &str, id: &str) -> Result<DocumentPath, ApiError> {
    DocumentPath::new(collection, id).ok_or(ApiError::BadRequest("invalid document path"))
}

async fn document(
    State(services): State<AppServices>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let path = document_path(&collection, &id)?;
    services
        .documents
        .get(&path)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn write_document(
    State(services): State<AppServices>,
    Path((collection, id)): Path<(String, String)>,
    Json(fields): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let path = document_path(&collection, &id)?;
    let stored = services.documents.put(&path, fields).await?;
    Ok(Json(stored))
}

async fn notify(State(services): State<AppServices>, Json(event): Json<HubEvent>) -> Json<Value> {
    let delivered = services.notifications.publish(event);
    Json(json!({ "delivered": delivered }))
}
