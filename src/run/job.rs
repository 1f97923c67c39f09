//! Job builders shared by the detached helpers, [`WorkerPool`](crate::WorkerPool) and
//! [`Group`](crate::Group).
//!
//! Each builder returns the future to execute plus the caller-side completion signal.
//! The future can then be spawned on the runtime or submitted to a pool; if it is dropped
//! without running, the signal still resolves.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::error;

use crate::context::{Context, Done, ResultFuture, Scope};
use crate::error::TaskError;
use crate::pool::WorkerPool;
use crate::pool::worker::panic_message;
use crate::tasks::{TaskRef, TaskResult};

/// Spawns on the pool when one is given, otherwise directly on the runtime.
pub(crate) async fn dispatch<F>(pool: Option<&WorkerPool>, job: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match pool {
        Some(pool) => pool.dispatch(job).await,
        None => {
            tokio::spawn(job);
        }
    }
}

pub(crate) fn run<F>(fut: F) -> (impl Future<Output = ()> + Send + 'static, Done)
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signal, done) = Done::channel();
    let job = async move {
        fut.await;
        signal.close();
    };
    (job, done)
}

/// The job waits for `fut` (spawned detached) or for `scope`, whichever ends first.
pub(crate) fn cancelable<F>(scope: Scope, fut: F) -> (impl Future<Output = ()> + Send + 'static, Done)
where
    F: Future<Output = ()> + Send + 'static,
{
    run(async move {
        let (inner, finished) = run(fut);
        tokio::spawn(inner);
        tokio::select! {
            biased;
            _ = finished => {}
            _ = scope.cancelled() => {}
        }
    })
}

pub(crate) fn task(task: TaskRef) -> (impl Future<Output = ()> + Send + 'static, ResultFuture) {
    let (tx, result) = ResultFuture::channel();
    let job = async move {
        let _ = tx.send(run_guarded(&task).await);
    };
    (job, result)
}

/// Runs the task, turning a panic into a [`TaskError::Panicked`] result.
pub(crate) async fn run_guarded(task: &TaskRef) -> TaskResult {
    match AssertUnwindSafe(task.run()).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let info = panic_message(panic.as_ref());
            error!(panic = %info, "task panicked");
            TaskResult::from_error(TaskError::Panicked { info })
        }
    }
}

/// Resolves to the task's result, or to [`TaskResult::from_scope`] when `scope` ends first.
pub(crate) fn cancelable_task(
    scope: Scope,
    task_ref: TaskRef,
) -> (impl Future<Output = ()> + Send + 'static, ResultFuture) {
    let (tx, result) = ResultFuture::channel();
    let job = async move {
        let _ = tx.send(race_task(&scope, task_ref).await);
    };
    (job, result)
}

pub(crate) async fn race_task(scope: &Scope, task_ref: TaskRef) -> TaskResult {
    let (inner, result) = task(task_ref);
    tokio::spawn(inner);
    tokio::select! {
        biased;
        r = result => r,
        _ = scope.cancelled() => TaskResult::from_scope(scope),
    }
}

/// Periodic loop: `f` runs every `interval` (first run after `init_delay`) with a frozen
/// context, until `f` aborts or `scope` ends. When the scope ends, `f` runs one last time
/// with the live context.
pub(crate) fn interval<F, Fut>(
    scope: Scope,
    interval: Duration,
    init_delay: Duration,
    mut f: F,
) -> (impl Future<Output = ()> + Send + 'static, Done)
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    assert!(!interval.is_zero(), "interval must be > 0");

    run(async move {
        let ctx = Context::new(Some(scope.clone()));
        let mut ticker = tokio::time::interval_at(Instant::now() + init_delay, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ctx.incr_count();
            tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    f(ctx.clone()).await;
                    return;
                }
                _ = ticker.tick() => {
                    f(ctx.freeze(false)).await;
                    if ctx.aborted() {
                        return;
                    }
                }
            }
        }
    })
}

/// Wraps `f` so that the owning scope is released as soon as an invocation reports done.
pub(crate) fn cancel_when_done<F, Fut>(
    scope: Scope,
    mut f: F,
) -> impl FnMut(Context) -> BoxFuture<'static, ()> + Send + 'static
where
    F: FnMut(Context) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    move |ctx: Context| {
        let fut = f(ctx.clone());
        let scope = scope.clone();
        async move {
            fut.await;
            if ctx.done() {
                scope.cancel();
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn dropped_job_resolves_done() {
        let (job, done) = run(sleep(Duration::from_secs(1)));
        drop(job);
        done.await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_final_call_sees_live_context() {
        let scope = Scope::new();
        let last = Arc::new(AtomicU64::new(0));
        let l = Arc::clone(&last);
        let s = scope.clone();

        let (job, done) = interval(
            scope.clone(),
            Duration::from_millis(10),
            Duration::ZERO,
            move |ctx| {
                let l = Arc::clone(&l);
                let s = s.clone();
                async move {
                    if ctx.done() {
                        assert!(ctx.canceled());
                        l.store(ctx.count(), Ordering::SeqCst);
                    } else if ctx.count() == 3 {
                        s.cancel();
                        assert!(!ctx.done(), "frozen view must not flip");
                    }
                }
            },
        );
        tokio::spawn(job);
        done.await;

        assert_eq!(last.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_stops_on_abort() {
        let calls = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&calls);

        let (job, done) = interval(
            Scope::new(),
            Duration::from_millis(10),
            Duration::from_millis(10),
            move |ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if ctx.count() == 2 {
                        ctx.abort();
                    }
                }
            },
        );
        tokio::spawn(job);
        done.await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
