//! Detached run helpers: each spawns its work directly on the tokio runtime and returns
//! a completion signal immediately.
//!
//! The pooled equivalents live on [`WorkerPool`](crate::WorkerPool).

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::error;

use crate::context::{Context, Done, ResultFuture, Scope};
use crate::pool::worker::panic_message;
use crate::run::{inline, job};
use crate::tasks::TaskRef;

/// Runs a future.
pub fn run<F>(fut: F) -> Done
where
    F: Future<Output = ()> + Send + 'static,
{
    let (job, done) = job::run(fut);
    tokio::spawn(job);
    done
}

/// Runs a future; the returned [`Done`] also resolves when `scope` ends.
///
/// The future itself is not interrupted.
pub fn run_cancelable<F>(scope: Scope, fut: F) -> Done
where
    F: Future<Output = ()> + Send + 'static,
{
    let (job, done) = job::cancelable(scope, fut);
    tokio::spawn(job);
    done
}

/// [`run_cancelable`] with a scope that times out after `timeout`.
pub fn run_time_limit<F>(timeout: Duration, fut: F) -> Done
where
    F: Future<Output = ()> + Send + 'static,
{
    run_cancelable(Scope::with_timeout(timeout), fut)
}

/// Runs a task and returns its result.
pub fn run_task(task: TaskRef) -> ResultFuture {
    let (job, result) = job::task(task);
    tokio::spawn(job);
    result
}

/// Runs a task; resolves to a canceled/timed-out result if `scope` ends first.
pub fn run_cancelable_task(scope: Scope, task: TaskRef) -> ResultFuture {
    let (job, result) = job::cancelable_task(scope, task);
    tokio::spawn(job);
    result
}

/// [`run_cancelable_task`] with a scope that times out after `timeout`.
pub fn run_time_limit_task(timeout: Duration, task: TaskRef) -> ResultFuture {
    run_cancelable_task(Scope::with_timeout(timeout), task)
}

/// Runs `f` every `interval` until `scope` ends or `f` aborts.
///
/// Regular iterations receive a frozen context; once the scope ends, `f` is called one last
/// time with the live context so it can observe `done()`.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::{Scope, run_cancelable_interval};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scope = Scope::new();
/// let done = run_cancelable_interval(scope.clone(), Duration::from_millis(5), |ctx| async move {
///     if ctx.count() >= 3 {
///         ctx.abort();
///     }
/// });
/// done.await;
/// # }
/// ```
pub fn run_cancelable_interval<F, Fut>(scope: Scope, interval: Duration, f: F) -> Done
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (job, done) = job::interval(scope, interval, interval, f);
    tokio::spawn(job);
    done
}

/// Runs `f` every `interval` until `timeout` elapses or `f` aborts.
pub fn run_time_limit_interval<F, Fut>(interval: Duration, timeout: Duration, f: F) -> Done
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let scope = Scope::with_timeout(timeout);
    let f = job::cancel_when_done(scope.clone(), f);
    run_cancelable_interval(scope, interval, f)
}

/// Calls `f` back-to-back until `scope` ends or `f` aborts (see [`do_until_cancel`](crate::do_until_cancel)).
pub fn run_until_cancel<F, Fut>(scope: Scope, f: F) -> Done
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    run(inline::do_until_cancel(scope, f))
}

/// Calls `f` back-to-back until `timeout` elapses or `f` aborts.
pub fn run_until_timeout<F, Fut>(timeout: Duration, f: F) -> Done
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    run(inline::do_until_timeout(timeout, f))
}

/// Spawns every future and returns once all of them have **started**.
pub async fn ensure_run<I, F>(futs: I)
where
    I: IntoIterator<Item = F>,
    F: Future<Output = ()> + Send + 'static,
{
    let started: Vec<_> = futs
        .into_iter()
        .map(|fut| {
            let (tx, rx) = oneshot::channel::<()>();
            tokio::spawn(async move {
                let _ = tx.send(());
                fut.await;
            });
            rx
        })
        .collect();
    join_all(started).await;
}

/// Spawns every future and returns once all of them have **finished**.
///
/// A panicking future is logged and counted as finished.
pub async fn ensure_done<I, F>(futs: I)
where
    I: IntoIterator<Item = F>,
    F: Future<Output = ()> + Send + 'static,
{
    let mut set = JoinSet::new();
    for fut in futs {
        set.spawn(fut);
    }
    while let Some(res) = set.join_next().await {
        if let Err(err) = res {
            if err.is_panic() {
                let panic = err.into_panic();
                error!(panic = %panic_message(panic.as_ref()), "ensure_done: future panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::tasks::{ErrTask, ValTask};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Instant, sleep};

    #[tokio::test(start_paused = true)]
    async fn run_resolves_after_future() {
        let hit = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hit);
        run(async move {
            sleep(Duration::from_millis(20)).await;
            h.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_time_limit_returns_at_deadline() {
        let start = Instant::now();
        run_time_limit(Duration::from_secs(1), sleep(Duration::from_secs(10))).await;
        let took = start.elapsed();
        assert!(took >= Duration::from_secs(1) && took < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelable_task_reports_canceled() {
        let scope = Scope::new();
        let task = ValTask::arc(|| async {
            sleep(Duration::from_secs(5)).await;
            Ok::<_, TaskError>(1i32)
        });
        let result = run_cancelable_task(scope.clone(), task);
        scope.cancel();

        let result = result.await;
        assert!(result.canceled());
        assert!(!result.timeout());
        assert_eq!(result.error(), Some(&TaskError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn time_limit_task_keeps_task_error() {
        let task = ErrTask::arc(|| async { Err(TaskError::fail("nope")) });
        let result = run_time_limit_task(Duration::from_secs(1), task).await;
        assert!(!result.timeout());
        assert_eq!(result.error(), Some(&TaskError::fail("nope")));
    }

    #[tokio::test(start_paused = true)]
    async fn until_timeout_loops_until_deadline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        run_until_timeout(Duration::from_millis(95), move |ctx| {
            let c = Arc::clone(&c);
            async move {
                if !ctx.done() {
                    c.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_done_waits_for_all() {
        let hit = Arc::new(AtomicUsize::new(0));
        let futs = (0..5u64).map(|i| {
            let hit = Arc::clone(&hit);
            async move {
                sleep(Duration::from_millis(10 * i)).await;
                hit.fetch_add(1, Ordering::SeqCst);
            }
        });
        ensure_done(futs).await;
        assert_eq!(hit.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_run_returns_before_finish() {
        let hit = Arc::new(AtomicUsize::new(0));
        let futs = (0..3).map(|_| {
            let hit = Arc::clone(&hit);
            async move {
                sleep(Duration::from_secs(1)).await;
                hit.fetch_add(1, Ordering::SeqCst);
            }
        });
        ensure_run(futs).await;
        assert_eq!(hit.load(Ordering::SeqCst), 0);
    }
}
