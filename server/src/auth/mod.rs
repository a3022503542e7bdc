//! Authentication module.
//!
//! Bearer tokens reach the gate either through the `Authorization` header or, for
//! real-time handshakes, through a query parameter relocated by the [`TokenBridge`].
//!
//! # Pre-conditions
//! - A complete `SigningConfig` is loaded before any route is registered.
//!
//! # Post-conditions
//! - Requests that pass `middleware::authenticate` carry a `Principal` extension.
//!
//! # Invariants
//! - Rejections never expose the reason a token failed validation.

pub mod bridge;
pub mod gate;
pub mod middleware;
pub mod signing;

pub use bridge::{BridgedToken, TokenBridge};
pub use gate::{AuthError, AuthFailure, AuthenticationGate, Principal};
pub use signing::{SigningConfig, SigningKey};
