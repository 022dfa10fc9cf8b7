//! Bounded-attempt retry with exponential backoff.
//!
//! REST calls that fail transiently are retried up to a fixed number of
//! attempts, sleeping `delay * backoff^k` between attempts. The final
//! failure is surfaced unchanged so the caller decides the recovery.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry schedule for a fallible call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of invocations allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff: 2.0,
        }
    }
}

/// Run `op` under `policy`, returning the first success or the last error.
///
/// Interim failures are logged at warning level with the attempt count.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    call = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(policy.backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Blocking variant of [`retry`] for call sites outside the runtime.
pub fn retry_blocking<T, E, F>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    call = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Call failed, retrying"
                );
                std::thread::sleep(delay);
                delay = delay.mul_f64(policy.backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff: 2.0,
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(fast_policy(), "ok", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(fast_policy(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(fast_policy(), "down", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {n}")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn blocking_variant_counts_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_blocking(fast_policy(), "down", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope".to_string())
        });

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
