//! Job Watchers
//!
//! Completion detection for asynchronous jobs, either by polling a status
//! endpoint (`poll`) or by listening on a push channel (`subscription`).
//! Both end in exactly one terminal callback unless cancelled first, and a
//! cancelled watcher never calls back again.

pub mod poll;
pub mod subscription;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub use poll::{PollUpdate, PollWatcher};
pub use subscription::Subscription;

/// Default poll attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
/// Default hard timeout for a push subscription
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Attempt budget and timing for watching one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub subscription_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
            subscription_timeout: DEFAULT_SUBSCRIPTION_TIMEOUT,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::validation("max_attempts must be at least 1"));
        }
        if self.subscription_timeout.is_zero() {
            return Err(CoreError::validation(
                "subscription_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}
