//! Bounded retry with exponential backoff for transient generation failures.

use std::time::Duration;

use tabletalk_core::config::BackendConfig;

use crate::error::GenerationErrorKind;

/// Hard ceiling on attempts per turn, whatever the configuration says.
pub const MAX_ATTEMPTS_CEILING: u32 = 5;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// `max_retries` counts attempts after the first one.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1).min(MAX_ATTEMPTS_CEILING),
            base_delay,
        }
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether to try again after `attempts` calls have failed, the last one
    /// with `kind`. Only rate limiting and timeouts are retried.
    pub fn should_retry(&self, attempts: u32, kind: GenerationErrorKind) -> bool {
        kind.is_transient() && attempts < self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base...
    /// capped at [`MAX_BACKOFF`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}
