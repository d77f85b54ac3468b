//! Bounded exponential backoff for calls to the content database and the
//! search index.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

use crate::errors::LoaderError;
use movies_etl_repository::{ContentRepositoryError, SearchIndexError};

/// Classifies errors that may succeed when the call is repeated.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for ContentRepositoryError {
    fn is_transient(&self) -> bool {
        ContentRepositoryError::is_transient(self)
    }
}

impl Transient for SearchIndexError {
    fn is_transient(&self) -> bool {
        SearchIndexError::is_transient(self)
    }
}

impl Transient for LoaderError {
    fn is_transient(&self) -> bool {
        match self {
            LoaderError::Index(e) => e.is_transient(),
            LoaderError::Serialization(_) | LoaderError::PartialBulkFailure { .. } => false,
        }
    }
}

/// Retry schedule for transient failures.
///
/// Delays start at `min_delay`, grow by `multiplier` on each attempt and are
/// capped at `max_delay`. Each delay is randomized with full jitter and then
/// floored at `min_delay`. Retrying stops once the delays would add up to more
/// than `max_elapsed`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u64,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
            max_elapsed: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1,
            max_elapsed: Duration::ZERO,
        }
    }

    /// The sequence of delays between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let min_delay = self.min_delay.max(Duration::from_millis(1));
        let max_elapsed = self.max_elapsed;
        let min_millis = u64::try_from(min_delay.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);

        // `from_millis(base).factor(f)` yields f * base^n, so the multiplier
        // is the base and the minimum delay the factor.
        ExponentialBackoff::from_millis(self.multiplier.max(1))
            .factor(min_millis)
            .max_delay(self.max_delay)
            .map(jitter)
            .map(move |delay| delay.max(min_delay))
            .scan(Duration::ZERO, move |elapsed, delay| {
                *elapsed += delay;
                (*elapsed <= max_elapsed).then_some(delay)
            })
    }

    /// Run `action` until it succeeds, fails with a non-transient error, or the
    /// retry budget runs out. The last error is returned in the latter cases.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut action: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        RetryIf::spawn(
            self.delays(),
            || action(),
            |e: &E| {
                let retry = e.is_transient();
                if retry {
                    warn!(operation = %operation, error = %e, "Transient failure, retrying");
                }
                retry
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2,
            max_elapsed: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_delays_are_bounded() {
        let policy = RetryPolicy {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
            multiplier: 2,
            max_elapsed: Duration::from_secs(5),
        };

        let delays: Vec<Duration> = policy.delays().collect();
        assert!(!delays.is_empty());

        let total: Duration = delays.iter().sum();
        assert!(total <= Duration::from_secs(5));
        for delay in delays {
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(800));
        }
    }

    #[test]
    fn test_none_policy_has_no_delays() {
        assert_eq!(RetryPolicy::none().delays().count(), 0);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let attempts = AtomicUsize::new(0);

        let result = fast_policy()
            .run("flaky", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SearchIndexError::connection("refused"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = fast_policy()
            .run("broken", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ContentRepositoryError::invalid_row("unknown role"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = fast_policy()
            .run("down", || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                Err(SearchIndexError::connection(format!("attempt {}", n)))
            })
            .await;

        let attempts = attempts.load(Ordering::SeqCst);
        assert!(attempts > 1);
        let err = result.unwrap_err();
        assert!(err.to_string().contains(&format!("attempt {}", attempts - 1)));
    }

    #[test]
    fn test_loader_error_classification() {
        assert!(LoaderError::from(SearchIndexError::connection("503")).is_transient());
        assert!(!LoaderError::partial("movies", 1, 2).is_transient());
    }
}
