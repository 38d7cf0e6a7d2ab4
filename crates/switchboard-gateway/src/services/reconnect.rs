//! Backend reconnection policy

use std::time::Duration;
use switchboard_common::ReconnectConfig;

/// Fixed-delay reconnection with an optional cap on consecutive failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before every reconnection attempt
    pub delay: Duration,

    /// Consecutive failed attempts after which the service is abandoned.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    #[must_use]
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), None)
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(Duration::from_millis(config.delay_ms), config.max_attempts)
    }
}
