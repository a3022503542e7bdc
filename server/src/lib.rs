// Startup:
// 1. Load settings (settings file + environment)
// 2. Compose:
//     - Validate JWT signing configuration
//     - Resolve credentials per dependency, build clients
//     - Wire authentication, token bridge and services
// 3. Bind the listener and serve
//
// Request path:
//  CORS -> trace -> hub token bridge -> authentication -> handler

pub mod auth;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod credentials;
pub mod environment;
pub mod hub;
pub mod routes;
pub mod services;
pub mod time;


#[cfg(test)]
mod e2e_tests;

pub use bootstrap::{Application, CompositionRoot};
