//! Document routes only address documents under the project's documents root.

use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::testing::valid_token;

#[tokio::test]
async fn test_encoded_traversal_in_collection_is_bad_request() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, body) = send(
        &app.router,
        get("/api/documents/..%2F..%2Fx/y", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "invalid document path");
}

#[tokio::test]
async fn test_dot_segments_are_bad_request() {
    let app = test_app();
    let token = valid_token("driver-42");

    for uri in [
        "/api/documents/../c-1",
        "/api/documents/chargers/..",
        "/api/documents/%2E%2E/c-1",
        "/api/documents/chargers/.",
    ] {
        let (status, _) = send(&app.router, get(uri, Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_encoded_query_in_id_is_bad_request() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, _) = send(
        &app.router,
        get("/api/documents/chargers/c-1%3Fmask.fieldPaths%3Dsecret", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_write_path_is_rejected_before_the_database() {
    let app = test_app();
    let token = valid_token("driver-42");
    let fields = json!({ "status": { "stringValue": "charging" } });

    let (status, _) = send(
        &app.router,
        request(
            Method::POST,
            "/api/documents/chargers/..%2Fsettings",
            Some(&token),
            Body::from(fields.to_string()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_path_still_requires_authentication() {
    let app = test_app();

    let (status, _) = send(&app.router, get("/api/documents/..%2F..%2Fx/y", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_document_put_is_not_routed() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            "/api/documents/chargers/c-1",
            Some(&token),
            Body::from("{}"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
