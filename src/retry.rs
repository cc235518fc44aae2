//! Bounded-retry helpers with exponential backoff.
//!
//! Transport-agnostic: the request executor drives its REST attempts through
//! [`retry_async`], and the policy math is exposed so callers can reason
//! about observed delays.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Policy controlling attempt count and backoff growth.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_backoff: Duration,
    /// Upper bound on the backoff delay.
    pub max_backoff: Duration,
    /// Maximum random jitter added to each delay. Zero keeps delays exact.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Deterministic policy: `retries` additional attempts after the first,
    /// delays of exactly `base * 2^i`, no jitter.
    pub fn steady(retries: usize, base: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            initial_backoff: base,
            max_backoff: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }

    /// Delay to apply before the given retry.
    ///
    /// `attempt` is 1-based: the delay after the first failed attempt is
    /// `initial_backoff`, then it doubles up to `max_backoff`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 1..attempt {
            delay = std::cmp::min(delay.saturating_mul(2), self.max_backoff);
        }
        delay + jitter_duration(self.jitter, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::steady(3, Duration::from_secs(1))
    }
}

/// Runs an async operation under `policy`, retrying errors accepted by
/// `should_retry`.
///
/// `op` receives the 1-based attempt number. The last error is returned when
/// attempts are exhausted or the predicate rejects an error.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    event = "attempt_failed",
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    unreachable!("max_attempts is always at least 1")
}

fn jitter_duration(max_jitter: Duration, attempt: usize) -> Duration {
    if max_jitter.is_zero() {
        return Duration::ZERO;
    }

    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if limit_nanos == 0 {
        return Duration::ZERO;
    }

    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ ((attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % (limit_nanos + 1))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{retry_async, RetryPolicy};

    #[test]
    fn steady_delays_double_without_jitter() {
        let policy = RetryPolicy::steady(3, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
    }

    #[test]
    fn delays_are_capped_by_max_backoff() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(7), Duration::from_millis(250));
    }

    #[test]
    fn persistent_failure_makes_retries_plus_one_attempts() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::steady(3, Duration::from_millis(1));

            let result: Result<(), String> = retry_async(
                &policy,
                {
                    let calls = Arc::clone(&calls);
                    move |attempt| {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err(format!("attempt {attempt} refused"))
                        }
                    }
                },
                |_| true,
            )
            .await;

            assert_eq!(calls.load(Ordering::SeqCst), 4);
            // The failure result carries the last error's message.
            assert_eq!(result.expect_err("failure"), "attempt 4 refused");
        });
    }

    #[test]
    fn recovers_once_an_attempt_succeeds() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::steady(4, Duration::from_millis(1));

            let result = retry_async(
                &policy,
                {
                    let calls = Arc::clone(&calls);
                    move |_| {
                        let calls = Arc::clone(&calls);
                        async move {
                            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                                Err("unavailable")
                            } else {
                                Ok("snapshot")
                            }
                        }
                    }
                },
                |_| true,
            )
            .await;

            assert_eq!(result.expect("success"), "snapshot");
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        });
    }

    #[test]
    fn predicate_rejection_stops_immediately() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");

        runtime.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let policy = RetryPolicy::steady(5, Duration::from_millis(1));

            let result: Result<(), &str> = retry_async(
                &policy,
                {
                    let calls = Arc::clone(&calls);
                    move |_| {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Err("malformed response")
                        }
                    }
                },
                |_| false,
            )
            .await;

            assert_eq!(result.expect_err("failure"), "malformed response");
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        });
    }
}
