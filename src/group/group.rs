//! # Task group.
//!
//! [`Group`] fans out tasks, either detached or through a [`WorkerPool`], and collects their
//! results by submission index into a [`GroupResult`].
//!
//! ```text
//! run_task(t0) ─► idx 0 ─┐
//! run_task(t1) ─► idx 1 ─┼─► workers ─► collect(idx, result) ─► GroupResult
//! run_task(t2) ─► idx 2 ─┘                     │
//!                                        gate.leave() ─► wait() wakes at 0
//! ```
//!
//! ## Rules
//! - `wait_or_cancel` / `wait_or_timeout` bound only the wait. Tasks keep running; the ones
//!   finishing after the wait ended are counted but not recorded.
//! - Waiting and submitting must happen from the same logical caller.
//! - A job dropped before completing (pool closed, task panicked) is recorded as
//!   canceled / panicked so that waiters never hang.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::context::Scope;
use crate::error::TaskError;
use crate::group::result::GroupResult;
use crate::pool::WorkerPool;
use crate::pool::gate::DrainGate;
use crate::run::job;
use crate::tasks::{TaskRef, TaskResult};

#[derive(Debug, Default)]
struct GroupState {
    gate: DrainGate,
    exist: AtomicUsize,
    done: AtomicUsize,
    result: Mutex<GroupResult>,
}

impl GroupState {
    fn result(&self) -> MutexGuard<'_, GroupResult> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn collect(&self, idx: usize, result: TaskResult) {
        self.done.fetch_add(1, Ordering::AcqRel);
        self.result().put(idx, result);
    }
}

/// Reserved result slot for one submitted task.
struct Slot {
    state: Arc<GroupState>,
    idx: usize,
    filled: bool,
}

impl Slot {
    fn fill(mut self, result: TaskResult) {
        self.state.collect(self.idx, result);
        self.filled = true;
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.filled {
            let result = if std::thread::panicking() {
                TaskResult::from_error(TaskError::Panicked {
                    info: format!("group task {} panicked", self.idx),
                })
            } else {
                debug!(idx = self.idx, "group task dropped before completion");
                TaskResult::interrupted(TaskError::Canceled)
            };
            self.state.collect(self.idx, result);
        }
        self.state.gate.leave();
    }
}

/// Fan-out coordinator collecting results by submission index.
///
/// # Example
/// ```
/// use taskhive::{Group, TaskError, ValTask};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group = Group::new();
/// for i in 0..3i32 {
///     group.run_task(ValTask::arc(move || async move { Ok::<_, TaskError>(i * 10) })).await;
/// }
///
/// let result = group.wait().await;
/// assert_eq!(result.len(), 3);
/// assert_eq!(result.get(2).and_then(|r| r.i32().ok()), Some(20));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Group {
    pool: Option<WorkerPool>,
    state: Arc<GroupState>,
}

impl Group {
    /// Group dispatching each task as a detached tokio task.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches this group's tasks through `pool`.
    ///
    /// ### Notes
    /// - Panics if tasks were already submitted.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        assert!(self.exist_task_count() == 0, "group is running");
        self.pool = Some(pool);
        self
    }

    /// Tasks submitted so far.
    pub fn exist_task_count(&self) -> usize {
        self.state.exist.load(Ordering::Acquire)
    }

    /// Tasks that have finished, including those finishing after an early wait ended.
    pub fn done_task_count(&self) -> usize {
        self.state.done.load(Ordering::Acquire)
    }

    pub fn pending_task_count(&self) -> usize {
        self.exist_task_count()
            .saturating_sub(self.done_task_count())
    }

    fn reserve(&self) -> Slot {
        self.state.gate.enter();
        let idx = self.state.exist.fetch_add(1, Ordering::AcqRel);
        Slot {
            state: Arc::clone(&self.state),
            idx,
            filled: false,
        }
    }

    /// Runs a future as a task with an empty result. Returns its index.
    pub async fn run<F>(&self, fut: F) -> usize
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slot = self.reserve();
        let idx = slot.idx;
        job::dispatch(self.pool.as_ref(), async move {
            fut.await;
            slot.fill(TaskResult::empty());
        })
        .await;
        idx
    }

    /// Runs a task. Returns its index.
    pub async fn run_task(&self, task: TaskRef) -> usize {
        let slot = self.reserve();
        let idx = slot.idx;
        job::dispatch(self.pool.as_ref(), async move {
            let result = job::run_guarded(&task).await;
            slot.fill(result);
        })
        .await;
        idx
    }

    /// Runs a task whose result becomes canceled/timed-out if `scope` ends first.
    ///
    /// The task itself runs detached so that it never occupies a pool worker after the scope ended.
    pub async fn run_cancelable_task(&self, scope: Scope, task: TaskRef) -> usize {
        let slot = self.reserve();
        let idx = slot.idx;
        job::dispatch(self.pool.as_ref(), async move {
            let result = job::race_task(&scope, task).await;
            slot.fill(result);
        })
        .await;
        idx
    }

    /// [`Group::run_cancelable_task`] with a scope that times out after `timeout`.
    pub async fn run_time_limit_task(&self, timeout: Duration, task: TaskRef) -> usize {
        self.run_cancelable_task(Scope::with_timeout(timeout), task)
            .await
    }

    /// Waits for every submitted task and returns the collected results.
    ///
    /// Can be called repeatedly; after an early-ended wait the result stays frozen.
    pub async fn wait(&self) -> GroupResult {
        self.state.gate.wait().await;
        self.snapshot()
    }

    /// Waits for every submitted task or for `scope` to end, whichever comes first.
    pub async fn wait_or_cancel(&self, scope: &Scope) -> GroupResult {
        tokio::select! {
            biased;
            _ = self.state.gate.wait() => {}
            _ = scope.cancelled() => {
                let reason = scope.err().unwrap_or(TaskError::Canceled);
                self.state.result().cancel(reason);
            }
        }
        self.snapshot()
    }

    /// Waits for every submitted task for at most `timeout`.
    pub async fn wait_or_timeout(&self, timeout: Duration) -> GroupResult {
        if tokio::time::timeout(timeout, self.state.gate.wait())
            .await
            .is_err()
        {
            self.state.result().cancel(TaskError::DeadlineExceeded);
        }
        self.snapshot()
    }

    fn snapshot(&self) -> GroupResult {
        self.state.result().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{ErrTask, ValTask};
    use tokio::time::sleep;

    fn sleepy(ms: u64, value: i32) -> TaskRef {
        ValTask::arc(move || async move {
            sleep(Duration::from_millis(ms)).await;
            Ok::<_, TaskError>(value)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn partial_result_is_frozen() {
        let group = Group::new();
        for (i, ms) in [1000u64, 1500, 1800, 5500, 6000, 7000].into_iter().enumerate() {
            group.run_task(sleepy(ms, i as i32)).await;
        }

        let r = group.wait_or_timeout(Duration::from_secs(4)).await;
        assert!(r.timeout());
        assert_eq!(r.len(), 3);
        assert_eq!(r.error(), Some(&TaskError::DeadlineExceeded));
        assert_eq!(group.pending_task_count(), 3);

        sleep(Duration::from_secs(5)).await;
        let r = group.wait_or_timeout(Duration::from_secs(4)).await;
        assert_eq!(r.len(), 3);
        assert_eq!(group.done_task_count(), 6);
        assert_eq!(group.wait().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_done_follows_completion_order() {
        let group = Group::new();
        for i in 0..5 {
            group.run_task(sleepy(100 + i as u64 * 10, i)).await;
        }
        group
            .run_task(ErrTask::arc(|| async { Err(TaskError::fail("early")) }))
            .await;

        let r = group.wait().await;
        assert_eq!(r.len(), 6);
        assert_eq!(r.first_done_idx(), Some(5));
        assert_eq!(r.first_ok_idx(), Some(0));
        assert_eq!(r.error(), Some(&TaskError::fail("early")));
        assert!(!r.timeout() && !r.canceled());
        assert_eq!(
            r.to_vec().iter().filter(|x| !x.has_error()).count(),
            5
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_or_cancel_records_cancel() {
        let group = Group::new();
        group.run_task(sleepy(10, 0)).await;
        group.run_task(sleepy(10_000, 1)).await;

        let scope = Scope::new();
        let s = scope.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            s.cancel();
        });

        let r = group.wait_or_cancel(&scope).await;
        assert!(r.canceled());
        assert_eq!(r.len(), 1);
        assert_eq!(r.error(), Some(&TaskError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn pooled_group_with_time_limits() {
        let pool = WorkerPool::new(2, 2, 4);
        let group = Group::new().with_pool(pool.clone());

        group
            .run_time_limit_task(Duration::from_millis(100), sleepy(1000, 0))
            .await;
        group
            .run_time_limit_task(Duration::from_millis(100), sleepy(10, 1))
            .await;
        group.run(sleep(Duration::from_millis(50))).await;

        let r = group.wait().await;
        assert_eq!(r.len(), 3);
        assert!(r.get(0).is_some_and(TaskResult::timeout));
        assert_eq!(r.get(1).and_then(|x| x.i32().ok()), Some(1));
        assert!(r.get(2).is_some_and(|x| !x.has_error()));
        pool.close().await;
    }

    #[tokio::test]
    async fn closed_pool_records_canceled() {
        let pool = WorkerPool::new(1, 1, 1);
        pool.close().await;

        let group = Group::new().with_pool(pool);
        group.run_task(sleepy(1, 0)).await;

        let r = group.wait().await;
        assert!(r.get(0).is_some_and(TaskResult::canceled));
    }

    #[tokio::test]
    async fn panicking_task_is_recorded() {
        let group = Group::new();
        group
            .run_task(ErrTask::arc(|| async {
                if true {
                    panic!("boom");
                }
                Ok(())
            }))
            .await;

        let r = group.wait().await;
        assert!(matches!(
            r.get(0).and_then(TaskResult::error),
            Some(TaskError::Panicked { .. })
        ));
    }
}
