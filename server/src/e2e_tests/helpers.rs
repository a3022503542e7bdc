//! Common helpers for end-to-end tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use tower::ServiceExt;

use crate::bootstrap::{Application, CompositionRoot};
use crate::config::{ConfigurationError, Settings};
use crate::environment::MapEnv;
use crate::testing::managed_env;

/// Nothing listens here, so every dependency call fails fast.
pub const UNREACHABLE_HOST: &str = "127.0.0.1:1";

/// Managed environment with both dependencies redirected to [`UNREACHABLE_HOST`].
pub fn test_env() -> MapEnv {
    managed_env()
        .with("FIRESTORE_EMULATOR_HOST", UNREACHABLE_HOST)
        .with("FIREBASE_AUTH_EMULATOR_HOST", UNREACHABLE_HOST)
}

/// Load settings from `env` and compose an application.
pub fn compose(env: MapEnv) -> Result<Application, ConfigurationError> {
    let settings = Settings::from_env(&env)?;
    CompositionRoot::new(Arc::new(env)).compose(&settings)
}

/// A composed application over [`test_env`].
pub fn test_app() -> Application {
    #[allow(clippy::expect_used)]
    compose(test_env()).expect("test environment composes")
}

/// Build a request with an optional `Authorization` header.
pub fn request(method: Method, uri: &str, bearer: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if method == Method::POST {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder = builder.method(method);
    #[allow(clippy::expect_used)]
    builder.body(body).expect("valid request")
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, bearer, Body::empty())
}

/// Send one request through the router and collect status and body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    #[allow(clippy::expect_used)]
    let response = router.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    #[allow(clippy::expect_used)]
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, String::from_utf8_lossy(&body).into_owned())
}

/// Serve the router on an ephemeral local port.
pub async fn spawn(router: Router) -> SocketAddr {
    #[allow(clippy::expect_used)]
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    #[allow(clippy::expect_used)]
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
