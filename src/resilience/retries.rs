//! Retry policy for collector exports.
//!
//! # Responsibilities
//! - Decide whether a failed export is worth another attempt
//! - Bound the number of attempts so a dead collector never queues work forever
//!
//! # Design Decisions
//! - Transport errors and timeouts are retryable
//! - 429 and 5xx are retryable; every other status is final
//! - Attempts run inside the exporter's concurrency permit

use std::time::Duration;

use crate::config::ExportRetryConfig;

/// Bounded retry settings resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Whether attempt number `attempt` (1-based) may be followed by another.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff to wait after attempt number `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        crate::resilience::backoff::calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

impl From<&ExportRetryConfig> for RetryPolicy {
    fn from(config: &ExportRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Check if an HTTP status from the collector warrants a retry.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
