//! Failure classification and the fixed transient backoff schedule.

mod failure;

pub use failure::{FailureClass, UpstreamFailure};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Delays between retries of the same key or the same unit of work.
///
/// Attempt `n` (zero-based) waits `delays[n]`; once the schedule is used up
/// the failure propagates.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    delays: Arc<[Duration]>,
}

impl BackoffSchedule {
    pub fn from_millis(delays: &[u64]) -> Self {
        Self { delays: delays.iter().copied().map(Duration::from_millis).collect() }
    }

    /// 1s, 2s, 4s.
    pub fn standard() -> Self {
        Self::from_millis(&[1000, 2000, 4000])
    }

    pub fn delay_for(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }

    /// Retries available after the first attempt.
    pub fn retries(&self) -> usize {
        self.delays.len()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

/// Strategy for retrying a failed attempt in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Give up on this key / unit of work.
    NoRetry,
    /// Retry after a fixed delay.
    FixedDelay(Duration),
}

/// Only transient failures are retried in place; the rest rotate the key.
pub fn determine_retry_strategy(
    class: FailureClass,
    attempt: usize,
    schedule: &BackoffSchedule,
) -> RetryStrategy {
    match (class, schedule.delay_for(attempt)) {
        (FailureClass::Transient, Some(delay)) => RetryStrategy::FixedDelay(delay),
        _ => RetryStrategy::NoRetry,
    }
}

/// Applies the retry strategy, sleeping the appropriate duration.
///
/// Returns `true` if retry should proceed, `false` if we should stop.
pub async fn apply_retry_strategy(strategy: RetryStrategy, attempt: usize, context: &str) -> bool {
    match strategy {
        RetryStrategy::NoRetry => {
            debug!(context, attempt = attempt + 1, "Not retrying");
            false
        },
        RetryStrategy::FixedDelay(duration) => {
            info!(
                context,
                attempt = attempt + 1,
                delay_ms = duration.as_millis() as u64,
                "Retrying after backoff"
            );
            sleep(duration).await;
            true
        },
    }
}

/// `base * (attempt + 1)`, used for file reads and directory deletes.
pub fn linear_delay(base: Duration, attempt: usize) -> Duration {
    base.saturating_mul(attempt as u32 + 1)
}
