//! Exponential backoff for storage calls made during bulk translation.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Row write-backs and mapping file writes: 3 attempts, waits 200ms, 400ms
    pub fn storage_write() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }

    /// Reading a table: 4 attempts, waits 500ms, 1s, 2s
    pub fn storage_read() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            ..Self::storage_write()
        }
    }

    /// Same shape with a different first wait
    pub fn with_initial_delay(self, initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..self
        }
    }

    /// Waits between consecutive attempts, capped at `max_delay`
    fn waits(&self) -> impl Iterator<Item = Duration> + '_ {
        let first = self.initial_delay.min(self.max_delay);
        std::iter::successors(Some(first), move |prev| {
            Some(prev.mul_f64(self.backoff_multiplier).min(self.max_delay))
        })
        .take(self.max_attempts.max(1) as usize - 1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::storage_write()
    }
}

/// Retry `operation` on any error; see [`with_retry_if`].
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(config, label, operation, |_| true).await
}

/// Run `operation` until it succeeds, `retryable` rejects the error, or the
/// attempts run out. The last error is returned.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut waits = config.waits();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} recovered on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !retryable(&err) {
            debug!("{} failed with a permanent error: {}", label, err);
            return Err(err);
        }
        let Some(wait) = waits.next() else {
            warn!("{} gave up after {} attempt(s): {}", label, attempt, err);
            return Err(err);
        };

        warn!(
            "{} attempt {} failed ({}); retrying in {:?}",
            label, attempt, err, wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
