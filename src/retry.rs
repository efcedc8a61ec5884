//! Backoff for requests Last.fm rate limits.

use crate::config::RetryConfig;
use crate::{Result, ScrobbleError};
use std::future::Future;
use std::time::Duration;

/// A value produced by [`retry_with_backoff`] and what it took to get it.
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: T,
    /// Rate-limited attempts before the one that went through
    pub attempts_made: u32,
    /// Seconds spent waiting between attempts
    pub total_retry_time: u64,
}

/// Delay before retry number `retries + 1`.
///
/// Honors Last.fm's hint, grows exponentially from `base_delay` and never
/// exceeds `max_delay`.
pub fn backoff_delay(config: &RetryConfig, retries: u32, retry_after: u64) -> u64 {
    let base_backoff = config
        .base_delay
        .saturating_mul(2_u64.saturating_pow(retries));
    retry_after
        .saturating_add(base_backoff)
        .min(config.max_delay)
}

/// Run `operation` until it stops returning [`ScrobbleError::RateLimit`] or
/// the retry budget is spent.
///
/// `on_rate_limit` is told the delay (in seconds) and the attempt number
/// before each wait. Any other error is returned at once. With retries
/// disabled the operation runs exactly once.
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    OnRateLimit: FnMut(u64, u32),
{
    let budget = if config.enabled { config.max_retries } else { 0 };
    let mut waited = 0;

    for attempt in 0..=budget {
        let retry_after = match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: attempt,
                    total_retry_time: waited,
                })
            }
            Err(ScrobbleError::RateLimit { retry_after }) => retry_after,
            Err(e) => return Err(e),
        };

        if attempt == budget {
            log::warn!("{operation_name} still rate limited after {budget} retries, giving up");
            return Err(ScrobbleError::RateLimit { retry_after });
        }

        let delay = backoff_delay(config, attempt, retry_after);
        log::info!(
            "{operation_name} rate limited, retry {} of {budget} in {delay}s",
            attempt + 1
        );
        on_rate_limit(delay, attempt + 1);
        tokio::time::sleep(Duration::from_secs(delay)).await;
        waited += delay;
    }

    // The last iteration of the loop always returns
    Err(ScrobbleError::RateLimit { retry_after: 0 })
}
