//! # Retry loop.
//!
//! ```text
//! attempt ──Ok──► return
//!    │Err
//!    ├─ retries exhausted ──► return last error
//!    └─ sleep(backoff.next(retry)) ──► attempt
//! ```
//!
//! `max_retries` counts retries after the first attempt; `0` retries forever.

use std::future::Future;

use tokio::time;
use tracing::debug;

use crate::context::Scope;
use crate::error::TaskError;
use crate::policies::backoff::BackoffPolicy;

/// Runs `f` until it succeeds or `max_retries` retries failed.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use taskhive::{BackoffPolicy, TaskError, do_retry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let calls = AtomicU32::new(0);
/// let policy = BackoffPolicy::constant(std::time::Duration::from_millis(1));
///
/// let out = do_retry(&policy, 5, || async {
///     if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///         Err(TaskError::fail("busy"))
///     } else {
///         Ok("done")
///     }
/// })
/// .await;
///
/// assert_eq!(out, Ok("done"));
/// assert_eq!(calls.load(Ordering::SeqCst), 3);
/// # }
/// ```
pub async fn do_retry<T, F, Fut>(
    policy: &BackoffPolicy,
    max_retries: u32,
    f: F,
) -> Result<T, TaskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
{
    do_retry_cancelable(&Scope::new(), policy, max_retries, f).await
}

/// [`do_retry`] that gives up during a backoff sleep once `scope` ends.
///
/// Returns the scope's error (`Canceled` or `DeadlineExceeded`) in that case.
/// A running attempt is never interrupted.
pub async fn do_retry_cancelable<T, F, Fut>(
    scope: &Scope,
    policy: &BackoffPolicy,
    max_retries: u32,
    mut f: F,
) -> Result<T, TaskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
{
    let mut retry: u32 = 0;
    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if max_retries != 0 && retry >= max_retries {
            debug!(retries = retry, error = %err, "retries exhausted");
            return Err(err);
        }

        let delay = policy.next(retry);
        retry = retry.saturating_add(1);
        debug!(retry, ?delay, error = %err, "retry scheduled");

        tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(scope.err().unwrap_or(TaskError::Canceled)),
            _ = time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn failing(calls: &AtomicU32) -> impl Future<Output = Result<(), TaskError>> + '_ {
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(TaskError::fail(format!("attempt {n}")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_with_last_error_and_backoff() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };

        let start = Instant::now();
        let out = do_retry(&policy, 3, || failing(&calls)).await;

        assert_eq!(out, Err(TaskError::fail("attempt 3")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // 100 + 200 + 400
        assert_eq!(start.elapsed(), Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_means_unlimited() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy::constant(Duration::from_millis(10));

        let out = do_retry(&policy, 0, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 50 {
                Err(TaskError::fail("not yet"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn scope_ends_backoff() {
        let calls = AtomicU32::new(0);
        let scope = Scope::with_timeout(Duration::from_millis(250));
        let policy = BackoffPolicy::constant(Duration::from_millis(100));

        let out = do_retry_cancelable(&scope, &policy, 0, || failing(&calls)).await;
        assert_eq!(out, Err(TaskError::DeadlineExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
