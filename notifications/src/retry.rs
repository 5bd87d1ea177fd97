//! Email send retries.
//!
//! Relays fail transiently (timeouts, greylisting), so every email gets a few
//! more tries before the dispatcher counts it as failed. Waits double after
//! each failure, are capped, and carry random jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently an email send is retried.
///
/// The default is 3 retries starting at 100ms, capped at 30s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Wait before the first retry
    pub initial_delay: Duration,
    /// Longest wait between two attempts
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

impl RetryPolicy {
    /// `max_retries` retries, the first after `initial_delay`.
    #[must_use]
    pub const fn new(max_retries: usize, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Send once, never retry.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Cap every wait at `max_delay`.
    #[must_use]
    pub const fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait before retry number `retry` (0-based), without jitter.
    #[must_use]
    pub fn backoff(&self, retry: usize) -> Duration {
        let factor = u32::try_from(retry)
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// [`Self::backoff`] scaled by a random factor in `0.5..=1.0`.
    #[must_use]
    pub fn jittered_backoff(&self, retry: usize) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.backoff(retry).mul_f64(jitter)
    }
}

/// Run `attempt` until it succeeds or the policy's retries are used up.
///
/// # Errors
///
/// The error of the last attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        let error = match attempt().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::debug!(retries = retry, "Send succeeded after retrying");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if retry >= policy.max_retries {
            return Err(error);
        }
        let wait = policy.jittered_backoff(retry);
        tracing::debug!(retry, wait_ms = wait.as_millis(), %error, "Send failed, retrying");
        tokio::time::sleep(wait).await;
        retry += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100)).with_max_delay(Duration::from_secs(1));

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_secs(1));
        assert_eq!(policy.backoff(usize::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_never_exceeds_the_backoff() {
        let policy = RetryPolicy::default();
        let full = policy.backoff(2);

        for _ in 0..100 {
            let wait = policy.jittered_backoff(2);
            assert!(wait >= full / 2 && wait <= full, "{wait:?}");
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = retry_with_backoff(&policy, || async move {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if call < 2 { Err("relay busy") } else { Ok(call) }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_is_returned() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let result: Result<(), String> = retry_with_backoff(&policy, || async move {
            Err(format!("attempt {} refused", counter.fetch_add(1, Ordering::SeqCst)))
        })
        .await;

        assert_eq!(result, Err("attempt 2 refused".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_tries_once() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result = retry_with_backoff(&RetryPolicy::no_retry(), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("refused")
        })
        .await;

        assert_eq!(result, Err("refused"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
