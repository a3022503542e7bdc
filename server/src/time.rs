//! Time source abstraction.
//!
//! Token lifetime checks take the current time from a `TimeSource` so that they can
//! run against a fixed clock in tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over the wall clock.
pub trait TimeSource: Send + Sync {
    /// Get the current time in seconds since Unix epoch.
    fn now_secs(&self) -> u64;
}

/// Real time source using system clock.
///
/// This is the default implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_secs(&self) -> u64 {
        // Only fails if the system clock is set before 1970; treat that as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_secs())
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub u64);

impl TimeSource for FixedTimeSource {
    fn now_secs(&self) -> u64 {
        self.0
    }
}
