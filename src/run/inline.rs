//! Helpers that run in the caller's own task.

use std::future::Future;
use std::time::Duration;

use crate::context::{Context, Scope};
use crate::run::job;

/// Calls `f` back-to-back until `scope` ends or `f` aborts.
///
/// Each iteration increments the context count. Regular iterations see a frozen context;
/// the iteration that starts after the scope ended gets the live one and is the last.
///
/// ### Notes
/// - The scope is only checked between iterations: a long `f` delays the exit.
pub async fn do_until_cancel<F, Fut>(scope: Scope, mut f: F)
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = ()>,
{
    let ctx = Context::new(Some(scope.clone()));
    loop {
        ctx.incr_count();
        if scope.is_done() {
            f(ctx.clone()).await;
            return;
        }

        f(ctx.freeze(false)).await;
        if ctx.aborted() {
            return;
        }
        tokio::task::yield_now().await;
    }
}

/// [`do_until_cancel`] with a scope that times out after `timeout`.
pub async fn do_until_timeout<F, Fut>(timeout: Duration, f: F)
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = ()>,
{
    let scope = Scope::with_timeout(timeout);
    do_until_cancel(scope.clone(), f).await;
    scope.cancel();
}

/// Awaits `fut` (spawned detached) or the end of `scope`, whichever comes first.
///
/// Returns the live context when the scope ended first, a frozen one otherwise, so
/// `ctx.done()` tells which side won.
pub async fn do_cancelable<F>(scope: Scope, fut: F) -> Context
where
    F: Future<Output = ()> + Send + 'static,
{
    let ctx = Context::new(Some(scope.clone()));
    let (inner, finished) = job::run(fut);
    tokio::spawn(inner);

    tokio::select! {
        biased;
        _ = finished => ctx.freeze(false),
        _ = scope.cancelled() => ctx,
    }
}

/// [`do_cancelable`] with a scope that times out after `timeout`.
pub async fn do_time_limit<F>(timeout: Duration, fut: F) -> Context
where
    F: Future<Output = ()> + Send + 'static,
{
    do_cancelable(Scope::with_timeout(timeout), fut).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn time_limit_reports_timeout() {
        let ctx = do_time_limit(Duration::from_millis(100), sleep(Duration::from_secs(1))).await;
        assert!(ctx.done());
        assert!(ctx.timeout());

        let ctx = do_time_limit(Duration::from_secs(1), sleep(Duration::from_millis(100))).await;
        assert!(!ctx.done());
        assert!(!ctx.timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn until_cancel_stops_on_abort() {
        let mut seen = Vec::new();
        do_until_cancel(Scope::new(), |ctx| {
            seen.push(ctx.count());
            async move {
                if ctx.count() == 3 {
                    ctx.abort();
                }
            }
        })
        .await;
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
