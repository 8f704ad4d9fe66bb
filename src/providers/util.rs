use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retry attempts after the first run (total runs = 1 + retries).
    pub retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Retries an async operation according to `policy`, returning the first
/// success or the last error.
pub async fn with_retry<F, Fut, T, E>(mut operation: F, policy: RetryPolicy) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(Into::into) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > policy.retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, policy.retries, err
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy {
            retries: 3,
            delay: Duration::from_millis(1),
        };

        let result = with_retry(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(anyhow!("flaky")) } else { Ok(n) }
            },
            policy,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let result: Result<(), Error> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("down"))
            },
            RetryPolicy::none(),
        )
        .await;

        assert_eq!(result.unwrap_err().to_string(), "down");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
