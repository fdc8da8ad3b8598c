// Retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Exponential schedule: `initial`, `initial * 2`, `initial * 4`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error; returned as soon as it happened.
    Fatal { attempt: u32, error: E },
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the attempt budget runs out. `on_retry` is told about every
/// wait before it starts.
pub async fn with_retry<F, Fut, T, E, P, R>(
    mut operation: F,
    backoff: Backoff,
    is_retryable: P,
    mut on_retry: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    R: FnMut(u32, Duration, &E),
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !is_retryable(&error) {
                    return Err(RetryError::Fatal { attempt, error });
                }
                if attempt >= backoff.max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                let delay = backoff.delay_after(attempt);
                on_retry(attempt, delay, &error);
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles() {
        let backoff = Backoff::new(Duration::from_secs(15), 3);
        assert_eq!(backoff.delay_after(1), Duration::from_secs(15));
        assert_eq!(backoff.delay_after(2), Duration::from_secs(30));
        assert_eq!(backoff.delay_after(3), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(Backoff::new(Duration::from_secs(1), 0).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let mut waits = Vec::new();

        let result = with_retry(
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if n < 3 { Err("busy") } else { Ok(n) } }
            },
            Backoff::new(Duration::from_secs(15), 3),
            |_: &&str| true,
            |_, delay, _| waits.push(delay),
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(waits, vec![Duration::from_secs(15), Duration::from_secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("bad request") }
            },
            Backoff::new(Duration::from_secs(15), 3),
            |_: &&str| false,
            |_, _, _| {},
        )
        .await;

        assert_eq!(result, Err(RetryError::Fatal { attempt: 1, error: "bad request" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_attempts() {
        let result: Result<(), _> = with_retry(
            |_| async { Err("busy") },
            Backoff::new(Duration::from_millis(10), 3),
            |_: &&str| true,
            |_, _, _| {},
        )
        .await;

        assert_eq!(result, Err(RetryError::Exhausted { attempts: 3, last: "busy" }));
    }
}
