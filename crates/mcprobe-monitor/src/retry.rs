//! Bounded retry with a fixed backoff interval.
//!
//! The backoff wait races the cancellation signal; cancellation wins
//! ties, so an already-fired signal stops the loop even with a zero
//! interval.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::CancellationSignal;

/// Attempt budget and wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call. `0` and `1` both mean a single try.
    pub attempts: u32,
    /// Wait between a failed attempt and the next one.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Why [`retry_with_backoff`] gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Cancellation fired during a backoff wait.
    #[error("process stopped")]
    Stopped,

    /// Every attempt failed; carries the last error.
    #[error("{0}")]
    Exhausted(E),
}

impl<E> RetryError<E> {
    pub fn is_stopped(&self) -> bool {
        matches!(self, RetryError::Stopped)
    }
}

/// Result of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// Sleep for `interval` unless `cancel` fires first.
pub async fn sleep_or_cancel(interval: Duration, cancel: &CancellationSignal) -> Wake {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Wake::Cancelled,
        _ = tokio::time::sleep(interval) => Wake::Elapsed,
    }
}

/// Run `operation` until it succeeds, the budget runs out, or
/// cancellation fires during a wait.
///
/// The budget is local to this call. Attempts are strictly sequential
/// and no wait follows the final failed attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationSignal,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts = policy.attempts;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts > 1 => {
                attempts -= 1;
                warn!(
                    attempts_left = attempts,
                    interval = ?policy.interval,
                    error = %e,
                    "unsuccessful attempt, retrying"
                );
            }
            Err(e) => return Err(RetryError::Exhausted(e)),
        }

        if sleep_or_cancel(policy.interval, cancel).await == Wake::Cancelled {
            debug!(attempts_left = attempts, "retry interrupted by cancellation");
            return Err(RetryError::Stopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom #{}", self.0)
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    fn flaky(failures: u32, calls: &mut u32) -> impl FnMut() -> std::future::Ready<Result<u32, Boom>> + '_ {
        move || {
            *calls += 1;
            let n = *calls;
            std::future::ready(if n <= failures { Err(Boom(n)) } else { Ok(n) })
        }
    }

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(1),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_budget_minus_one_failures() {
        let interval = Duration::from_millis(10);
        for budget in 1..=6 {
            let (_canceller, cancel) = cancellation();
            let mut calls = 0;
            let start = Instant::now();

            let result = retry_with_backoff(
                RetryPolicy::new(budget, interval),
                &cancel,
                flaky(budget - 1, &mut calls),
            )
            .await;

            assert_eq!(result.unwrap(), budget);
            assert_eq!(calls, budget);
            assert_elapsed(start, interval * (budget - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_exactly_budget_attempts() {
        let interval = Duration::from_millis(10);
        for budget in 1..=6 {
            let (_canceller, cancel) = cancellation();
            let mut calls = 0;
            let start = Instant::now();

            let result =
                retry_with_backoff(RetryPolicy::new(budget, interval), &cancel, flaky(u32::MAX, &mut calls))
                    .await;

            match result {
                Err(RetryError::Exhausted(Boom(last))) => assert_eq!(last, budget),
                other => panic!("expected exhaustion, got {other:?}"),
            }
            assert_eq!(calls, budget);
            // No wait after the final failure.
            assert_elapsed(start, interval * (budget - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_tries_once() {
        let (_canceller, cancel) = cancellation();
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            RetryPolicy::new(0, Duration::from_secs(1)),
            &cancel,
            flaky(u32::MAX, &mut calls),
        )
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted(Boom(1)))));
        assert_eq!(calls, 1);
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_fails_without_waiting() {
        let (_canceller, cancel) = cancellation();
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            RetryPolicy::new(1, Duration::from_secs(10)),
            &cancel,
            flaky(u32::MAX, &mut calls),
        )
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted(_))));
        assert_eq!(calls, 1);
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_waits_two_intervals() {
        let (_canceller, cancel) = cancellation();
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            RetryPolicy::new(3, Duration::from_millis(10)),
            &cancel,
            flaky(2, &mut calls),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
        assert_elapsed(start, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn fired_cancellation_stops_before_next_attempt() {
        let (canceller, cancel) = cancellation();
        canceller.cancel();
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            RetryPolicy::new(5, Duration::from_secs(1)),
            &cancel,
            flaky(u32::MAX, &mut calls),
        )
        .await;

        assert!(matches!(result, Err(RetryError::Stopped)));
        assert_eq!(calls, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_interrupts_it() {
        let (canceller, cancel) = cancellation();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            RetryPolicy::new(5, Duration::from_secs(1)),
            &cancel,
            flaky(u32::MAX, &mut calls),
        )
        .await;

        assert!(result.unwrap_err().is_stopped());
        assert_eq!(calls, 1);
        assert_elapsed(start, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_observes_cancellation() {
        let (canceller, cancel) = cancellation();
        canceller.cancel();
        let mut calls = 0;

        let result = retry_with_backoff(
            RetryPolicy::new(10, Duration::ZERO),
            &cancel,
            flaky(u32::MAX, &mut calls),
        )
        .await;

        assert!(result.unwrap_err().is_stopped());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_retries_without_delay() {
        let (_canceller, cancel) = cancellation();
        let mut calls = 0;
        let start = Instant::now();

        let result =
            retry_with_backoff(RetryPolicy::new(4, Duration::ZERO), &cancel, flaky(3, &mut calls)).await;

        assert_eq!(result.unwrap(), 4);
        assert_elapsed(start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_fresh_on_every_call() {
        let (_canceller, cancel) = cancellation();
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        for _ in 0..100 {
            let mut calls = 0;
            let result = retry_with_backoff(policy, &cancel, flaky(1, &mut calls)).await;
            assert_eq!(result.unwrap(), 2);
        }
    }

    #[test]
    fn exhausted_displays_inner_error() {
        let err: RetryError<Boom> = RetryError::Exhausted(Boom(3));
        assert_eq!(err.to_string(), "boom #3");
        assert_eq!(RetryError::<Boom>::Stopped.to_string(), "process stopped");
    }
}
