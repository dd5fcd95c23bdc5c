//! Bounded retry with exponential backoff for remote model calls.
//!
//! LLM APIs shed load with HTTP 429, and under that condition waiting and
//! retrying almost always succeeds. Everything else — auth failures,
//! disabled services, malformed requests — will fail identically on every
//! attempt, so retrying would only add latency. The wrapper therefore
//! retries *only* rate-limit failures, with a doubling delay per attempt
//! (`initial * 2^attempt`), and propagates the original error otherwise.
//! No jitter, no circuit breaker: a single in-flight request per pipeline
//! stage does not need either.

use crate::error::ProviderError;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Retry knobs for one category of remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds; doubles per attempt.
    /// Default: 1000.
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Reduced policy for per-image vision calls: a document may hold many
    /// images and each one already degrades to a fallback caption, so
    /// spending the full retry budget per image is not worth the latency.
    pub fn for_vision() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 2000,
        }
    }
}

/// Invoke `op`, retrying rate-limited failures per `policy`.
///
/// The closure is re-invoked from scratch on each attempt. Non-rate-limit
/// failures and retry exhaustion both propagate the original error
/// unchanged.
pub async fn with_backoff<T, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, ProviderError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.max_retries.max(1);
    let mut last_err: Option<ProviderError> = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let is_last = attempt + 1 == attempts;
                if !err.is_rate_limit() || is_last {
                    return Err(err);
                }
                let delay = policy.initial_delay_ms.saturating_mul(1u64 << attempt);
                warn!(
                    "rate limited, retrying in {}ms (attempt {}/{})",
                    delay,
                    attempt + 1,
                    attempts
                );
                sleep(Duration::from_millis(delay)).await;
                last_err = Some(err);
            }
        }
    }

    // Unreachable in practice: the loop always returns from its final pass.
    Err(last_err.unwrap_or(ProviderError::Api {
        message: "retry loop exhausted".into(),
    }))
}
