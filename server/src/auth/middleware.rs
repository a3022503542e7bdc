//! Axum middleware for the authentication pipeline.
//!
//! Order matters: [`bridge_query_token`] runs on every request before
//! [`authenticate`], which guards the protected routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AuthError, AuthFailure, AuthenticationGate, BridgedToken, TokenBridge};

/// Rejection returned for unauthenticated requests.
///
/// The response never reveals why validation failed.
#[derive(Debug)]
pub struct Unauthorized(pub AuthError);

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

/// Copy a handshake's query token into the request's credential slot.
pub async fn bridge_query_token(
    State(bridge): State<Arc<TokenBridge>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bridge.extract(request.uri().path(), request.uri().query()) {
        tracing::debug!(path = %request.uri().path(), "using query token for handshake");
        request.extensions_mut().insert(token);
    }
    next.run(request).await
}

/// Validate the request's credential and attach the resulting `Principal`.
pub async fn authenticate(
    State(gate): State<Arc<AuthenticationGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Unauthorized> {
    let Some(credential) = credential(&request) else {
        return Err(Unauthorized(AuthFailure::MissingCredential.into()));
    };

    match gate.validate(&credential) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), "rejected credential: {e}");
            Err(Unauthorized(e))
        }
    }
}

/// The credential for this request: a bridged token if present, else the bearer header.
fn credential(request: &Request) -> Option<String> {
    if let Some(BridgedToken(token)) = request.extensions().get::<BridgedToken>() {
        return Some(token.clone());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
}

fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
