//! Hub handshakes authenticated through the query-string token.

use axum::http::StatusCode;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::e2e_tests::helpers::*;
use crate::services::HubEvent;
use crate::testing::valid_token;

/// Open a TCP connection and send a WebSocket upgrade request for `target`.
/// Returns the stream and the response head.
async fn handshake(addr: std::net::SocketAddr, target: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.expect("write");

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.expect("response head");
        head.push(byte[0]);
    }
    (stream, String::from_utf8_lossy(&head).into_owned())
}

/// Read one unmasked server text frame with a payload under 126 bytes.
async fn read_text_frame(stream: &mut TcpStream) -> String {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await.expect("frame header");
    assert_eq!(header[0], 0x81, "expected a final text frame");
    let len = usize::from(header[1] & 0x7f);
    assert!(len < 126, "payload too large for this helper");
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.expect("frame payload");
    String::from_utf8(payload).expect("utf-8 text frame")
}

#[tokio::test]
async fn test_query_token_opens_hub_and_receives_events() {
    let app = test_app();
    let notifications = app.services.notifications.clone();
    let addr = spawn(app.router).await;

    let token = valid_token("hub-user");
    let (mut stream, head) = handshake(addr, &format!("/chargerhub?access_token={token}")).await;
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");

    let delivered = notifications.publish(HubEvent {
        event: "status".to_owned(),
        payload: json!({ "chargerId": "c-1" }),
    });
    assert_eq!(delivered, 1);

    let frame: Value = serde_json::from_str(&read_text_frame(&mut stream).await).expect("json");
    assert_eq!(frame, json!({ "event": "status", "payload": { "chargerId": "c-1" } }));
}

#[tokio::test]
async fn test_hub_without_token_is_rejected() {
    let addr = spawn(test_app().router).await;

    let (_stream, head) = handshake(addr, "/chargerhub").await;
    assert!(head.starts_with("HTTP/1.1 401"), "unexpected response: {head}");
}

#[tokio::test]
async fn test_hub_with_invalid_query_token_is_rejected() {
    let addr = spawn(test_app().router).await;

    let (_stream, head) = handshake(addr, "/chargerhub?access_token=not-a-jwt").await;
    assert!(head.starts_with("HTTP/1.1 401"), "unexpected response: {head}");
}

#[tokio::test]
async fn test_query_token_outside_hub_is_ignored() {
    let app = test_app();
    let token = valid_token("api-user");

    let (status, body) = send(&app.router, get(&format!("/api/me?access_token={token}"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "unauthorized");
}

#[tokio::test]
async fn test_first_query_token_wins() {
    let app = test_app();
    let token = valid_token("first");
    let uri = format!("/chargerhub?access_token={token}&access_token=garbage");

    // No upgrade headers: authentication passes, then the upgrade itself is refused.
    let (status, _) = send(&app.router, get(&uri, None)).await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/chargerhub?access_token=garbage&access_token={token}");
    let (status, _) = send(&app.router, get(&uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
