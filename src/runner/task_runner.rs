//! # Background task lifecycle.
//!
//! [`TaskRunner`] hosts one [`BgTask`] and tracks whether it is running.
//!
//! ```text
//!          start()                    Done resolves
//! stopped ────────► running ──────────────────────────► after_stop hook ──► stopped
//!                      │                                      ▲
//!                      └── stop(): cancel scope, wait ────────┘
//! ```
//!
//! ## Rules
//! - `start` on a running runner is a no-op; `stop` on a stopped one returns at once.
//! - Each start gets a fresh scope (a child of the parent scope, if any).
//! - The hook runs once per run, before `stop`/`wait` return.
//! - Runs are numbered; `stop`/`wait` follow the run current at the call and return once it
//!   finished or a newer run replaced it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::context::Scope;
use crate::error::TaskError;
use crate::runner::Runner;
use crate::runner::bg_task::BgTask;

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug)]
struct RunStatus {
    id: u64,
    finished: bool,
}

struct RunnerState {
    running: AtomicBool,
    status: watch::Sender<RunStatus>,
    scope: Mutex<Option<Scope>>,
}

impl RunnerState {
    fn begin(&self) -> u64 {
        let mut id = 0;
        self.status.send_modify(|status| {
            status.id += 1;
            status.finished = false;
            id = status.id;
        });
        id
    }

    fn finish(&self, id: u64) {
        self.status.send_if_modified(|status| {
            if status.id != id || status.finished {
                return false;
            }
            status.finished = true;
            true
        });
    }

    fn cancel(&self) {
        let scope = self.scope.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(scope) = scope.as_ref() {
            scope.cancel();
        }
    }
}

/// Start/stop state machine around a [`BgTask`].
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::{BgTaskFn, TaskRunner, run_until_cancel};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runner = TaskRunner::new(BgTaskFn::arc(|scope| {
///     Ok(run_until_cancel(scope, |_ctx| tokio::time::sleep(Duration::from_millis(5))))
/// }));
///
/// runner.start().unwrap();
/// assert!(runner.is_running());
/// runner.stop().await;
/// assert!(!runner.is_running());
/// # }
/// ```
pub struct TaskRunner {
    task: Arc<dyn BgTask>,
    parent: Option<Scope>,
    after_stop: Option<Hook>,
    state: Arc<RunnerState>,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl TaskRunner {
    pub fn new(task: Arc<dyn BgTask>) -> Self {
        let (status, _) = watch::channel(RunStatus {
            id: 0,
            finished: true,
        });
        Self {
            task,
            parent: None,
            after_stop: None,
            state: Arc::new(RunnerState {
                running: AtomicBool::new(false),
                status,
                scope: Mutex::new(None),
            }),
        }
    }

    /// Derives each run's scope from `parent`, so ending `parent` stops the task.
    pub fn with_parent(mut self, parent: Scope) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Called after each run finished, whether stopped or completed on its own.
    pub fn with_after_stop<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.after_stop = Some(Arc::new(hook));
        self
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Starts the task unless it is already running.
    ///
    /// Returns the task's own error if it could not be started.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), TaskError> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let scope = match &self.parent {
            Some(parent) => parent.child(),
            None => Scope::new(),
        };
        let id = self.state.begin();
        *self.state.scope.lock().unwrap_or_else(PoisonError::into_inner) = Some(scope.clone());

        let done = match self.task.run(scope) {
            Ok(done) => done,
            Err(err) => {
                debug!(error = %err, "background task failed to start");
                self.state.scope.lock().unwrap_or_else(PoisonError::into_inner).take();
                self.state.running.store(false, Ordering::Release);
                self.state.finish(id);
                return Err(err);
            }
        };

        let state = Arc::clone(&self.state);
        let hook = self.after_stop.clone();
        tokio::spawn(async move {
            done.await;
            if let Some(hook) = hook {
                hook();
            }
            state.scope.lock().unwrap_or_else(PoisonError::into_inner).take();
            state.running.store(false, Ordering::Release);
            state.finish(id);
            debug!(run = id, "background task stopped");
        });
        Ok(())
    }

    /// Cancels the running task and waits until it finished.
    pub async fn stop(&self) {
        let mut rx = self.state.status.subscribe();
        let id = rx.borrow().id;
        if !self.is_running() {
            return;
        }
        self.state.cancel();
        Self::wait_run(&mut rx, id).await;
    }

    /// Waits until the current run finished; returns at once when stopped.
    pub async fn wait(&self) {
        let mut rx = self.state.status.subscribe();
        let id = rx.borrow().id;
        Self::wait_run(&mut rx, id).await;
    }

    async fn wait_run(rx: &mut watch::Receiver<RunStatus>, id: u64) {
        let _ = rx
            .wait_for(|status| status.id != id || status.finished)
            .await;
    }
}

#[async_trait]
impl Runner for TaskRunner {
    fn start(&self) -> Result<(), TaskError> {
        TaskRunner::start(self)
    }

    async fn stop(&self) {
        TaskRunner::stop(self).await
    }

    fn is_running(&self) -> bool {
        TaskRunner::is_running(self)
    }
}
