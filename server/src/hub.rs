//! Real-time hub endpoint.
//!
//! # Pre-conditions
//! - The authentication layer has already attached a `Principal`; unauthenticated
//!   handshakes never reach the upgrade.
//!
//! # Post-conditions
//! - Every `HubEvent` published while the connection is open is sent as one JSON
//!   text frame, in publish order.
//!
//! Inbound application messages are ignored. The hub is push-only.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tokio::sync::broadcast;

use crate::auth::Principal;
use crate::services::{AppServices, HubEvent};

pub async fn connect(
    ws: WebSocketUpgrade,
    State(services): State<AppServices>,
    Extension(principal): Extension<Principal>,
) -> impl IntoResponse {
    let subject = principal.subject.unwrap_or_default();
    tracing::debug!(%subject, "hub connection accepted");
    // Subscribe before upgrading so nothing published after the handshake is missed.
    let events = services.notifications.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events, subject))
}

async fn handle_socket(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<HubEvent>,
    subject: String,
) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::warn!(%subject, "hub receive error: {e}");
                        return;
                    }
                    None => {
                        tracing::debug!(%subject, "hub client disconnected");
                        return;
                    }
                };

                match msg {
                    Message::Ping(data) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Message::Close(_) => {
                        tracing::debug!(%subject, "hub client sent close");
                        return;
                    }
                    Message::Text(_) | Message::Binary(_) | Message::Pong(_) => {}
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::warn!(event = %event.event, "cannot encode hub event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            tracing::debug!(%subject, "hub client disconnected during push");
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!(%subject, "hub connection lagged by {count} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("hub channel closed");
                        return;
                    }
                }
            }
        }
    }
}
