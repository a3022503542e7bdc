//! Bearer header authentication on ordinary API routes.

use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::e2e_tests::helpers::*;
use crate::testing::{TEST_AUDIENCE, TEST_ISSUER, TEST_KEY, sign, valid_claims, valid_token};

#[tokio::test]
async fn test_valid_token_yields_principal() {
    let app = test_app();
    let token = valid_token("driver-42");

    let (status, body) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let principal: Value = serde_json::from_str(&body).expect("principal json");
    assert_eq!(principal["subject"], json!("driver-42"));
    assert_eq!(principal["issuer"], json!(TEST_ISSUER));
    assert_eq!(principal["claims"]["aud"], json!(TEST_AUDIENCE));
}

#[tokio::test]
async fn test_missing_header_is_rejected() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/api/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "unauthorized");
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let app = test_app();
    let mut claims = valid_claims("driver-42");
    claims["aud"] = json!("another-app");
    let token = sign(&claims, TEST_KEY.as_bytes());

    let (status, body) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "unauthorized");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = test_app();
    let mut claims = valid_claims("driver-42");
    claims["exp"] = json!(1_000_000_000u64);
    let token = sign(&claims, TEST_KEY.as_bytes());

    let (status, _) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let app = test_app();
    let token = sign(&valid_claims("driver-42"), b"some-other-key-of-sufficient-length");

    let (status, _) = send(&app.router, get("/api/me", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}
