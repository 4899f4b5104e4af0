//! Back-off policy for idempotent API calls.
//!
//! Only errors for which [`ApiError::is_retryable`] holds are retried. Reply
//! submission never goes through here: a retried reel-share may post twice.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

const MAX_DELAY_MS: u64 = 60_000;

/// Exponential back-off: `base_ms * 2^(attempt-1)`, ±25 % jitter, 60 s cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    pub max_retries: u32,
    pub base_ms: u64,
}

impl Backoff {
    /// Un-jittered delay before retry number `attempt` (1-based). A rate-limit
    /// hint raises the delay but never past the cap.
    pub(crate) fn nominal_delay_ms(self, attempt: u32, err: &ApiError) -> u64 {
        let exponential = self
            .base_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
        let hinted = match err {
            ApiError::RateLimited { retry_after_secs } if self.base_ms > 0 => {
                retry_after_secs.saturating_mul(1_000)
            }
            _ => 0,
        };
        exponential.max(hinted).min(MAX_DELAY_MS)
    }

    fn jittered(nominal_ms: u64) -> Duration {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let ms = (nominal_ms as f64 * (0.75 + rand::random::<f64>() * 0.5)) as u64;
        Duration::from_millis(ms)
    }
}

/// Runs `operation`, retrying transient failures under `policy`. `what`
/// names the call in logs.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: Backoff,
    what: &str,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }
        attempt += 1;
        let delay = Backoff::jittered(policy.nominal_delay_ms(attempt, &err));
        tracing::warn!(
            call = what,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient API error; backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
