//! Bounded retry with exponential back-off and jitter.
//!
//! Both HTTP fetches and LLM calls go through [`retry_with_backoff`]; the caller
//! decides which errors are transient.

use std::future::Future;
use std::time::Duration;

use log::warn;

const MAX_DELAY_MS: u64 = 30_000;

/// Retry budget shared by the fetcher and the LLM context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Base delay; attempt `n` sleeps `base * 2^(n-1)` with ±25% jitter.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests and local backends.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base_ms: 0,
        }
    }

    fn delay_for(self, attempt: u32) -> Duration {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1_u64 << attempt.saturating_sub(1).min(10));
        let capped = computed.min(MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or the
/// retry budget is spent. The last error is returned.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    label: &str,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0_u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_transient(&err) || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "{label}: transient error ({err}), retry {attempt}/{} in {}ms",
                    policy.max_retries,
                    delay.as_millis()
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
