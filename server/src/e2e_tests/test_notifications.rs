//! Publishing hub events over the API.

use axum::{
    body::Body,
    http::{Method, StatusCode},
};
use serde_json::{Value, json};

use crate::e2e_tests::helpers::*;
use crate::testing::valid_token;

fn publish_request(token: Option<&str>, body: &Value) -> axum::http::Request<Body> {
    request(
        Method::POST,
        "/api/notifications",
        token,
        Body::from(body.to_string()),
    )
}

#[tokio::test]
async fn test_publish_without_listeners() {
    let app = test_app();
    let token = valid_token("operator");

    let (status, body) = send(
        &app.router,
        publish_request(Some(&token), &json!({ "event": "status" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).expect("json"), json!({ "delivered": 0 }));
}

#[tokio::test]
async fn test_publish_reaches_subscriber() {
    let app = test_app();
    let mut events = app.services.notifications.subscribe();
    let token = valid_token("operator");

    let (status, body) = send(
        &app.router,
        publish_request(
            Some(&token),
            &json!({ "event": "session-started", "payload": { "chargerId": "c-7" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).expect("json"), json!({ "delivered": 1 }));

    let event = events.recv().await.expect("event");
    assert_eq!(event.event, "session-started");
    assert_eq!(event.payload, json!({ "chargerId": "c-7" }));
}

#[tokio::test]
async fn test_publish_requires_authentication() {
    let app = test_app();
    let (status, _) = send(&app.router, publish_request(None, &json!({ "event": "status" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
