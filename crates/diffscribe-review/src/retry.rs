use std::future::Future;
use std::time::Duration;

use diffscribe_core::{DiffscribeError, RetryConfig};
use tracing::warn;

/// Result of a single attempt that may have been rate limited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The call succeeded.
    Ready(T),
    /// The server answered 429 Too Many Requests.
    RateLimited,
}

/// A value produced by [`RetryPolicy::run`] together with the number of
/// rate-limit retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

/// Linear backoff for rate-limited calls.
///
/// Only [`Attempt::RateLimited`] is retried; errors returned by the
/// attempt propagate immediately. The wait before retry `n` (1-based) is
/// `n * base_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use diffscribe_review::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(10));
/// assert_eq!(policy.delay_for(1), Duration::from_secs(10));
/// assert_eq!(policy.delay_for(3), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first rate-limited attempt.
    pub max_retries: u32,
    /// Backoff step.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Build a policy from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_secs(config.base_delay_secs))
    }

    /// Wait before the given 1-based retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    /// Drive `attempt` until it succeeds, fails, or the retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns whatever error `attempt` returns, or
    /// [`DiffscribeError::RateLimited`] once every attempt was rate limited.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<Retried<T>, DiffscribeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, DiffscribeError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await? {
                Attempt::Ready(value) => return Ok(Retried { value, retries }),
                Attempt::RateLimited if retries < self.max_retries => {
                    retries += 1;
                    let wait = self.delay_for(retries);
                    warn!(
                        retry = retries,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs_f64(),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Attempt::RateLimited => {
                    return Err(DiffscribeError::RateLimited {
                        attempts: retries + 1,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    type Outcome = Result<Attempt<&'static str>, DiffscribeError>;

    fn scripted(outcomes: Vec<Outcome>) -> impl FnMut() -> std::future::Ready<Outcome> {
        let mut outcomes = outcomes.into_iter();
        move || std::future::ready(outcomes.next().unwrap_or(Ok(Attempt::RateLimited)))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10));
        let start = tokio::time::Instant::now();

        let result = policy
            .run(scripted(vec![
                Ok(Attempt::RateLimited),
                Ok(Attempt::RateLimited),
                Ok(Attempt::Ready("done")),
            ]))
            .await
            .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.retries, 2);
        // 10s before the first retry, 20s before the second.
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, Duration::from_secs(10));
        let calls = AtomicU32::new(0);

        let err = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<Attempt<()>, DiffscribeError>(Attempt::RateLimited) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, DiffscribeError::RateLimited { attempts: 3 }));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let calls = AtomicU32::new(0);

        let err = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Attempt<()>, _>(DiffscribeError::Llm("500".into())) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, DiffscribeError::Llm(_)));
    }

    #[tokio::test]
    async fn zero_retries_fails_on_first_rate_limit() {
        let policy = RetryPolicy::new(0, Duration::from_secs(10));
        let err = policy
            .run(scripted(vec![Ok(Attempt::RateLimited)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DiffscribeError::RateLimited { attempts: 1 }));
    }

    #[test]
    fn default_policy_matches_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
    }
}
