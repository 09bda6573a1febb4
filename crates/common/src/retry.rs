//! Exponential backoff for store calls.

use std::future::Future;
use std::time::Duration;

use object_store::StoreError;
use rand::Rng;

/// Delay growth factor between consecutive retries.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;
/// Fraction of the delay randomly added or removed.
pub const BACKOFF_JITTER: f64 = 0.2;

/// How often and how patiently a store call is retried.
///
/// Only [`StoreError::Transient`] failures and attempt timeouts are retried;
/// everything else ends the call right away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
    /// Upper bound on a single attempt
    pub timeout: Duration,
}

/// Result of a retried call along with how many retries it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, StoreError>,
    pub retries: u32,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            multiplier: BACKOFF_MULTIPLIER,
            jitter: BACKOFF_JITTER,
            timeout,
        }
    }

    /// Delay to wait before retry number `retry` (1-based), without jitter.
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        self.base_delay.mul_f64(factor)
    }

    /// Delay to wait before retry number `retry`, jittered by ±`jitter`.
    pub fn delay(&self, retry: u32) -> Duration {
        let nominal = self.nominal_delay(retry);
        if self.jitter <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let spread = rand::rng().random_range(-self.jitter..=self.jitter);
        nominal.mul_f64(1.0 + spread)
    }

    /// Run `op` until it succeeds, fails definitively or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut retries = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Transient(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                ))),
            };

            match result {
                Err(e) if e.is_transient() && retries + 1 < self.attempts => {
                    retries += 1;
                    let delay = self.delay(retries);
                    tracing::warn!(
                        operation = what,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return Attempted { result, retries },
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1), Duration::from_secs(5))
    }

    #[test]
    fn test_nominal_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.nominal_delay(1), Duration::from_millis(200));
        assert_eq!(policy.nominal_delay(2), Duration::from_millis(400));
        assert_eq!(policy.nominal_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(2);
            assert!(delay >= Duration::from_millis(320));
            assert!(delay <= Duration::from_millis(480));
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let attempted = fast_policy(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::Transient("503".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(attempted.result.unwrap(), 7);
        assert_eq!(attempted.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let attempted: Attempted<()> = fast_policy(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Transient("reset".to_string()))
            })
            .await;

        assert!(attempted.result.unwrap_err().is_transient());
        assert_eq!(attempted.retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = AtomicU32::new(0);
        let attempted: Attempted<()> = fast_policy(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::NotFound("k".to_string()))
            })
            .await;

        assert!(attempted.result.unwrap_err().is_not_found());
        assert_eq!(attempted.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(10));
        let attempted: Attempted<()> = policy
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(attempted.result.unwrap_err().is_transient());
        assert_eq!(attempted.retries, 1);
    }
}
