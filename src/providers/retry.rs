//! Adapter-local retry with exponential backoff and full jitter.
//!
//! Only `Transport` errors are retried under the configured budget — a
//! flaky network is the one failure worth a second attempt from the same
//! adapter.  A `RateLimited` error carrying a short `retry-after` hint
//! (≤ 2 s) is retried once in place; a longer hint propagates to the
//! manager, which puts the provider on cooldown instead of blocking the
//! caller.  Every other error kind propagates immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::error::ProviderError;

/// First backoff step.
const BACKOFF_BASE_MS: u64 = 500;
/// Upper bound on a single backoff sleep.
const BACKOFF_CAP_MS: u64 = 4_000;
/// Longest `retry-after` hint honoured in place rather than propagated.
const SHORT_RATE_LIMIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Backoff schedule
// ---------------------------------------------------------------------------

/// Sleep duration before retry number `attempt` (0-based).
///
/// Full jitter: uniform over `0..=min(cap, base * 2^attempt)`.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    let ceiling = exp.min(BACKOFF_CAP_MS);
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}

// ---------------------------------------------------------------------------
// Retry loop
// ---------------------------------------------------------------------------

/// Run `attempt_fn` until it succeeds or the retry budget is spent.
///
/// `attempt_fn` is called at least once; each call must issue a fresh HTTP
/// request.  `max_retries` bounds the *additional* transport attempts.
pub async fn with_retries<F, Fut, T>(
    provider: &str,
    max_retries: u32,
    mut attempt_fn: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut transport_attempts = 0u32;
    let mut rate_retry_done = false;

    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),

            Err(err) if err.is_transport() && transport_attempts < max_retries => {
                let delay = backoff_delay(transport_attempts);
                transport_attempts += 1;
                log::debug!(
                    "{provider}: transport error ({err}), retry {transport_attempts}/{max_retries} \
                     after {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }

            Err(ProviderError::RateLimited {
                message,
                retry_after: Some(wait),
            }) if !rate_retry_done && wait <= SHORT_RATE_LIMIT => {
                rate_retry_done = true;
                log::debug!("{provider}: short rate limit ({message}), retrying after {wait:?}");
                tokio::time::sleep(wait).await;
            }

            Err(err) => return Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
