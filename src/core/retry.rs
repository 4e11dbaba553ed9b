//! Retry policy for provider requests.
//!
//! Attempts are sequential. After the n-th failed attempt the caller waits
//! `n * delay_unit` before trying again, so each pause is longer than the
//! one before it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded linear-backoff retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds, multiplied by the attempt index
    #[serde(default = "default_delay_unit")]
    pub delay_unit_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_delay_unit() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_unit_ms: default_delay_unit(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_unit: Duration) -> Self {
        Self {
            max_attempts,
            delay_unit_ms: delay_unit.as_millis() as u64,
        }
    }

    /// Delay to wait after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_unit_ms.saturating_mul(u64::from(attempt.max(1))))
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
