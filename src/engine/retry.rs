//! Retry wrapper for broker calls.
//!
//! Only errors that `BrokerError::is_retryable` marks as transient are
//! retried; anything else is returned on the first failure.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::types::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles per retry, capped at `max_delay`.
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub kind: BackoffKind,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total attempts including the first; `None` retries indefinitely.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            kind: config.policy,
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            max_attempts: (config.max_attempts > 0).then_some(config.max_attempts),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let factor = 2u32.checked_pow(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "Retryable broker error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
