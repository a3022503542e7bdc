//! End-to-end tests through the composed router.
//!
//! Each test file covers a specific scenario. Applications are composed from an
//! in-memory environment, and cloud dependencies point at an unreachable emulator
//! address so no test ever leaves the machine.

#![cfg(test)]

mod helpers;

mod test_dependency_errors;
mod test_document_paths;
mod test_header_auth;
mod test_hub_handshake;
mod test_notifications;
mod test_startup_aborts;
