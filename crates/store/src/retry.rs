use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Attempts allowed before a relational-store operation gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Retry an operation with quadratic backoff.
///
/// Attempt `n` failing sleeps `n²` seconds before attempt `n + 1`
/// (1s, 4s, 9s, …).
///
/// Returns the final error once `max_attempts` is exhausted; deciding
/// whether that is fatal (roster loads) or survivable (result persistence)
/// is the caller's call.
pub async fn with_quadratic_retry<T, E, F, Fut>(
    operation: &str,
    max_attempts: u32,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let backoff = Duration::from_secs(u64::from(attempt * attempt));
                warn!(
                    operation = operation,
                    attempt = attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %e,
                    "operation failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    operation = operation,
                    attempts = max_attempts,
                    error = %e,
                    "operation failed, retries exhausted"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let started = tokio::time::Instant::now();
        let result: Result<u32, String> =
            with_quadratic_retry("test-op", 5, move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two failures: slept 1² + 2² = 5 seconds before the success.
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_error_when_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        let result: Result<u32, String> = with_quadratic_retry("test-op", 3, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn first_try_success_does_not_sleep() {
        let result: Result<&str, &str> =
            with_quadratic_retry("test-op", 5, || async { Ok("ok") }).await;
        assert_eq!(result.unwrap(), "ok");
    }
}
