use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff between reconnect attempts after repeated fill failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Double the delay on each attempt instead of keeping it fixed
    pub exponential: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            exponential: true,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = if self.exponential {
            self.base_delay_ms
                .saturating_mul(1u64 << attempt.min(20))
        } else {
            self.base_delay_ms
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}
