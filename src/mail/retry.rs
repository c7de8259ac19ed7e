//! Timeout and exponential backoff for backend calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::BackendError;

/// Delay before retry number `attempt` (0-based), doubling and capped.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config
        .base_delay
        .checked_mul(factor)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Run `call` with a per-attempt timeout, retrying transient failures.
///
/// Elapsed attempts count as `Unavailable`. `NotFound` and `Unauthorized`
/// return immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    call_timeout: Duration,
    operation: &str,
    call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    retry_loop(config, call_timeout, None, operation, call).await
}

/// Like [`with_retry`], but never runs past `deadline`.
///
/// Each attempt is cut to the time left, and no retry starts once the
/// backoff would reach the deadline. Running out of time is `Unavailable`.
pub async fn with_retry_until<T, F, Fut>(
    config: &RetryConfig,
    call_timeout: Duration,
    deadline: Instant,
    operation: &str,
    call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    retry_loop(config, call_timeout, Some(deadline), operation, call).await
}

async fn retry_loop<T, F, Fut>(
    config: &RetryConfig,
    call_timeout: Duration,
    deadline: Option<Instant>,
    operation: &str,
    mut call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let attempts = config.attempts.max(1);
    let mut last_error = BackendError::unavailable(format!("{operation}: no attempt made"));

    for attempt in 0..attempts {
        let limit = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    warn!(operation, attempt, "Budget exhausted before attempt");
                    return Err(BackendError::unavailable(format!(
                        "{operation}: budget exhausted"
                    )));
                }
                call_timeout.min(left)
            }
            None => call_timeout,
        };

        let outcome = match tokio::time::timeout(limit, call()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::unavailable(format!(
                "{operation} timed out after {limit:?}"
            ))),
        };

        match outcome {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "Backend call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() => {
                warn!(operation, attempt, error = %e, "Transient backend failure");
                last_error = e;
                if attempt + 1 < attempts {
                    let delay = backoff_delay(config, attempt);
                    if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                        debug!(operation, attempt, "No time left for another attempt");
                        break;
                    }
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}
