//! Bounded exponential backoff
//!
//! Retries stay inside a single probe of a single record.

use crate::error::StoreFault;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry budget for one probe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 is treated as 1)
    pub max_attempts: usize,
    /// Delay before the second attempt
    pub base_backoff_ms: u64,
    /// Upper bound on any single delay
    pub max_backoff_ms: u64,
}

/// Delay schedule
pub trait BackoffPolicy {
    /// Delay after failed attempt number `attempt` (1-based)
    fn delay_for_attempt(&self, attempt: usize) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(32);
        let ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable fault, or the
    /// budget is spent
    ///
    /// # Errors
    /// The last fault observed.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, StoreFault>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreFault>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(fault) if fault.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(attempt, ?delay, %fault, "retrying store probe");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(fault) => {
                    if fault.is_retryable() {
                        tracing::warn!(attempts = attempt, %fault, "retry budget exhausted");
                    }
                    return Err(fault);
                }
            }
        }
    }
}
