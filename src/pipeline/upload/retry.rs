//! Bounded retry with pure exponential backoff.
//!
//! Attempts are numbered from 1. After a failed attempt `n` (when another
//! attempt remains) the caller is suspended for `base_delay * 2^(n-1)`.
//! There is no jitter. A cancellation observed before an attempt, during an
//! attempt, or during a delay ends the loop immediately.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The cancellation token fired.
    Cancelled,
    /// Every attempt failed; `last` is the final error observed.
    Exhausted { attempts: u32, last: E },
    /// The error was classified as not worth retrying.
    NotRetryable { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// The underlying error, if the loop stopped because of one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Cancelled => None,
            Self::Exhausted { last, .. } => Some(last),
            Self::NotRetryable { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` of 0 is treated as 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Retry every error.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(cancel, op, |_| true, |_, _, _| {}).await
    }

    /// Retry errors accepted by `retryable`; `on_retry(attempt, delay, err)`
    /// runs before each backoff delay.
    pub async fn execute_with<T, E, F, Fut, R, H>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        retryable: R,
        mut on_retry: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        H: FnMut(u32, Duration, &E),
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = op(attempt) => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !retryable(&error) {
                return Err(RetryError::NotRetryable { attempt, error });
            }
            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_for(attempt);
            on_retry(attempt, delay, &error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(crate::config::DEFAULT_BASE_DELAY_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::time::Instant;

    use super::*;

    const BASE: Duration = Duration::from_millis(100);

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::new(5, BASE);
        assert_eq!(policy.delay_for(1), BASE);
        assert_eq!(policy.delay_for(2), BASE * 2);
        assert_eq!(policy.delay_for(3), BASE * 4);
        assert_eq!(policy.delay_for(4), BASE * 8);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::new(100, BASE);
        assert!(policy.delay_for(64) >= policy.delay_for(32));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_with_exponential_delays() {
        let policy = RetryPolicy::new(3, BASE);
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let seen: Arc<Mutex<Vec<Duration>>> = Arc::default();

        let result = policy
            .execute(&cancel, |attempt| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(started.elapsed());
                    if attempt < 3 {
                        Err("boom")
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1] - seen[0], BASE);
        assert_eq!(seen[2] - seen[1], BASE * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_with_last_error() {
        let policy = RetryPolicy::new(3, BASE);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(&cancel, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            })
            .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "failure 3".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(3, BASE);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute_with(
                &cancel,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(401u16) }
                },
                |status| *status >= 500,
                |_, _, _| {},
            )
            .await;

        assert_eq!(
            result,
            Err(RetryError::NotRetryable {
                attempt: 1,
                error: 401
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_never_attempts() {
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<&str>> = policy
            .execute(&cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_skips_next_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let task = {
            let cancel = cancel.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                policy
                    .execute(&cancel, |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<(), _>("down") }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let result = task.await.unwrap();

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_retry_sees_each_delay() {
        let policy = RetryPolicy::new(3, BASE);
        let cancel = CancellationToken::new();
        let mut delays = Vec::new();

        let _: Result<(), _> = policy
            .execute_with(
                &cancel,
                |_| async { Err("fail") },
                |_| true,
                |attempt, delay, _| delays.push((attempt, delay)),
            )
            .await;

        assert_eq!(delays, vec![(1, BASE), (2, BASE * 2)]);
    }
}
