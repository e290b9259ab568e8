//! Bounded retries with a fixed delay plus random jitter.
//!
//! Every remote call (WebDAV listing, download, upload, annotation-service
//! requests) goes through a [`RetryPolicy`]. Which errors are worth
//! retrying is decided by a predicate, by default [`Transient::is_transient`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Errors that know whether a retry could help.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Tunable parameters for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub base_delay: Duration,
    /// Upper bound of the random extra pause added to `base_delay`.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote_io()
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter,
        }
    }

    /// Listing and downloading: 3 attempts, 1 s plus up to 0.5 s.
    pub const fn remote_io() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_millis(500))
    }

    /// Per-frame uploads: 3 attempts, 5 s apart.
    pub const fn frame_upload() -> Self {
        Self::new(3, Duration::from_secs(5), Duration::ZERO)
    }

    /// No pauses between attempts.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Pause before the next attempt for a jitter sample in `[0, 1]`.
    pub fn delay(&self, jitter_fraction: f64) -> Duration {
        let fraction = if jitter_fraction.is_finite() {
            jitter_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.base_delay + self.jitter.mul_f64(fraction)
    }

    fn sample_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base_delay;
        }
        let fraction: f64 = rand::rng().random_range(0.0..=1.0);
        self.delay(fraction)
    }

    /// Run `op`, retrying errors that report themselves as transient.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        self.run_if(operation, |e: &E| e.is_transient(), op).await
    }

    /// Run `op`, retrying errors accepted by `retryable`. The last error is
    /// returned once attempts are exhausted.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        operation: &str,
        retryable: P,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && retryable(&e) => {
                    let delay = self.sample_delay();
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote operation failed, retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempt > 1 {
                        tracing::error!(operation, attempt, error = %e, "Remote operation failed");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.transient)
        }
    }

    impl Transient for Flaky {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    // -- delay -----------------------------------------------------------

    #[test]
    fn delay_adds_bounded_jitter() {
        let policy = RetryPolicy::remote_io();
        assert_eq!(policy.delay(0.0), Duration::from_secs(1));
        assert_eq!(policy.delay(1.0), Duration::from_millis(1500));
        assert_eq!(policy.delay(7.0), Duration::from_millis(1500));
        assert_eq!(policy.delay(f64::NAN), Duration::from_secs(1));
    }

    // -- run -------------------------------------------------------------

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<u32, Flaky> = RetryPolicy::immediate(3)
            .run("test", move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Flaky { transient: true })
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), Flaky> = RetryPolicy::immediate(3)
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Flaky { transient: true })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), Flaky> = RetryPolicy::immediate(5)
            .run("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Flaky { transient: false })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let _: Result<(), Flaky> = RetryPolicy::immediate(0)
            .run_if("test", |_| true, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Flaky { transient: true })
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
