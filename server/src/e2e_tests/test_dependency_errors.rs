//! Dependency failures after startup surface as 502 without crashing the server.

use axum::http::StatusCode;

use crate::e2e_tests::helpers::*;
use crate::testing::valid_token;

#[tokio::test]
async fn test_unreachable_database_is_bad_gateway() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, body) = send(&app.router, get("/api/documents/chargers/c-1", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, "dependency unavailable");
}

#[tokio::test]
async fn test_unreachable_identity_provider_is_bad_gateway() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, _) = send(&app.router, get("/api/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_server_keeps_serving_after_dependency_failure() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, _) = send(&app.router, get("/api/documents/chargers/c-1", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dependency_routes_require_authentication() {
    let app = test_app();
    let (status, _) = send(&app.router, get("/api/documents/chargers/c-1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_document_write_to_unreachable_database_is_bad_gateway() {
    let app = test_app();
    let token = valid_token("driver-42");
    let fields = serde_json::json!({ "status": { "stringValue": "charging" } });

    let (status, _) = send(
        &app.router,
        request(
            axum::http::Method::POST,
            "/api/documents/chargers/c-1",
            Some(&token),
            axum::body::Body::from(fields.to_string()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
