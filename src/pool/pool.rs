//! # Bounded worker pool.
//!
//! [`WorkerPool`] executes submitted futures on a bounded set of tokio tasks ("workers")
//! fed by a bounded queue.
//!
//! ```text
//! submit(job)
//!   ├─► try_send ───────────────────────────────► queue ──► core / assist workers
//!   ├─► queue full, workers < max: spawn assist ─┘
//!   └─► queue full, workers == max: wait for a slot (or for close)
//! ```
//!
//! ## Rules
//! - `min_workers` core workers start immediately and live until close.
//! - Assist workers exit after `idle_timeout` without work.
//! - At most `max_workers` jobs run at the same time.
//! - Every accepted job is counted as pending until it finishes or is discarded by close.
//! - [`WorkerPool::wait`] must be called by the same logical caller that submitted the work.
//!   Submitting from inside a job of the same pool while that caller waits is unsupported.
//! - A job that panics is logged and counted as finished; the worker keeps running.
//! - Close stops intake, discards what is still queued, then waits for workers to exit.
//!   Running jobs are never interrupted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::context::{Context, Done, ResultFuture, Scope};
use crate::error::{PoolError, SubmitError};
use crate::pool::gate::DrainGate;
use crate::pool::worker::{WorkerKind, spawn_worker};
use crate::run::job;
use crate::tasks::TaskRef;

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub(crate) struct Shared {
    pub(crate) config: PoolConfig,
    pub(crate) queue: Mutex<mpsc::Receiver<Job>>,
    pub(crate) workers: watch::Sender<usize>,
    pub(crate) gate: DrainGate,
    pub(crate) quit: CancellationToken,
    tx: mpsc::Sender<Job>,
    released: CancellationToken,
    closed: AtomicBool,
    admission: RwLock<()>,
    worker_ids: AtomicUsize,
}

impl Shared {
    pub(crate) fn next_worker_id(&self) -> usize {
        self.worker_ids.fetch_add(1, Ordering::Relaxed)
    }

    fn try_add_worker(&self) -> bool {
        let max = self.config.max_workers;
        self.workers.send_if_modified(|n| {
            if *n < max {
                *n += 1;
                true
            } else {
                false
            }
        })
    }

    async fn discard_queued(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let mut discarded = 0;
        while let Ok(job) = queue.try_recv() {
            drop(job);
            self.gate.leave();
            discarded += 1;
        }
        discarded
    }
}

/// Closes the pool when the last user handle is dropped.
struct Owner {
    shared: Arc<Shared>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.quit.cancel();
    }
}

/// Bounded pool of workers. Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
    _owner: Arc<Owner>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.shared.config)
            .field("workers", &self.exist_worker_size())
            .field("pending", &self.pending_task_size())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool with `min_workers` core workers, up to `max_workers` total,
    /// and a queue of `queue_capacity` jobs.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    /// - Panics if `min_workers == 0` or `min_workers > max_workers`.
    pub fn new(min_workers: usize, max_workers: usize, queue_capacity: usize) -> Self {
        Self::with_config(PoolConfig::new(min_workers, max_workers, queue_capacity))
    }

    /// Creates a pool from a full [`PoolConfig`].
    pub fn with_config(config: PoolConfig) -> Self {
        config.validate();

        let (tx, rx) = mpsc::channel(config.channel_capacity());
        let (workers, _) = watch::channel(config.min_workers);
        let shared = Arc::new(Shared {
            queue: Mutex::new(rx),
            workers,
            gate: DrainGate::new(),
            quit: CancellationToken::new(),
            tx,
            released: CancellationToken::new(),
            closed: AtomicBool::new(false),
            admission: RwLock::new(()),
            worker_ids: AtomicUsize::new(0),
            config,
        });

        for _ in 0..shared.config.min_workers {
            spawn_worker(&shared, WorkerKind::Core);
        }
        debug!(
            min = shared.config.min_workers,
            max = shared.config.max_workers,
            queue = shared.config.queue_capacity,
            "worker pool started"
        );

        Self {
            _owner: Arc::new(Owner {
                shared: Arc::clone(&shared),
            }),
            shared,
        }
    }

    /// Queues a future for execution.
    ///
    /// Waits for a queue slot when the pool is saturated.
    ///
    /// ### Errors
    /// - [`SubmitError::Closed`] if the pool is closed, or closes while waiting for a slot.
    ///   The future is dropped without running.
    pub async fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shared = &self.shared;
        let _admission = shared.admission.read().await;
        if shared.closed.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }

        shared.gate.enter();
        let job = match shared.tx.try_send(Box::pin(job)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) => job,
            Err(TrySendError::Closed(_)) => {
                shared.gate.leave();
                return Err(SubmitError::Closed);
            }
        };

        if shared.try_add_worker() {
            spawn_worker(shared, WorkerKind::Assist);
        }

        let sent = tokio::select! {
            biased;
            _ = shared.quit.cancelled() => false,
            res = shared.tx.send(job) => res.is_ok(),
        };
        if sent {
            Ok(())
        } else {
            shared.gate.leave();
            Err(SubmitError::Closed)
        }
    }

    /// Waits until all pending jobs have finished.
    ///
    /// Returns immediately after [`WorkerPool::close_with_timeout`] gave up on stuck workers.
    pub async fn wait(&self) {
        tokio::select! {
            _ = self.shared.gate.wait() => {}
            _ = self.shared.released.cancelled() => {}
        }
    }

    /// Stops intake, discards queued jobs and waits for all workers to exit.
    ///
    /// Idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown(None).await;
    }

    /// Like [`WorkerPool::close`], but stops waiting after `timeout`.
    ///
    /// ### Errors
    /// - [`PoolError::GraceExceeded`] if some workers were still running jobs. Those jobs keep
    ///   running in the background; [`WorkerPool::pending_task_size`] reports them.
    pub async fn close_with_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
        self.shutdown(Some(timeout)).await
    }

    async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), PoolError> {
        let shared = &self.shared;
        if !shared.closed.swap(true, Ordering::AcqRel) {
            debug!("closing worker pool");
        }
        shared.quit.cancel();

        {
            let _admission = shared.admission.write().await;
            let discarded = shared.discard_queued().await;
            if discarded > 0 {
                warn!(discarded, "discarded queued jobs on close");
            }
        }

        let mut workers = shared.workers.subscribe();
        let exited = workers.wait_for(|n| *n == 0);
        let Some(grace) = timeout else {
            let _ = exited.await;
            debug!("worker pool closed");
            return Ok(());
        };

        match tokio::time::timeout(grace, exited).await {
            Ok(_) => {
                debug!("worker pool closed");
                Ok(())
            }
            Err(_) => {
                shared.released.cancel();
                let pending = shared.gate.pending();
                warn!(?grace, pending, "worker pool close timed out");
                Err(PoolError::GraceExceeded { grace, pending })
            }
        }
    }

    /// True once close has started.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Jobs queued or running.
    pub fn pending_task_size(&self) -> usize {
        self.shared.gate.pending()
    }

    /// Live workers, core plus assist.
    pub fn exist_worker_size(&self) -> usize {
        *self.shared.workers.borrow()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub(crate) async fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(err) = self.submit(job).await {
            debug!(reason = err.as_label(), "job rejected");
        }
    }

    /// Runs a future on the pool.
    ///
    /// The returned [`Done`] resolves when the future finishes, or right away if the pool
    /// rejected it.
    pub async fn run<F>(&self, fut: F) -> Done
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (job, done) = job::run(fut);
        self.dispatch(job).await;
        done
    }

    /// Runs a future; the returned [`Done`] also resolves when `scope` ends.
    ///
    /// The worker is released when the scope ends; the future itself keeps running detached.
    pub async fn run_cancelable<F>(&self, scope: Scope, fut: F) -> Done
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (job, done) = job::cancelable(scope, fut);
        self.dispatch(job).await;
        done
    }

    /// [`WorkerPool::run_cancelable`] with a scope that times out after `timeout`.
    pub async fn run_time_limit<F>(&self, timeout: Duration, fut: F) -> Done
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.run_cancelable(Scope::with_timeout(timeout), fut).await
    }

    /// Runs a task and returns its result.
    pub async fn run_task(&self, task: TaskRef) -> ResultFuture {
        let (job, result) = job::task(task);
        self.dispatch(job).await;
        result
    }

    /// Runs a task; resolves to a canceled/timed-out result if `scope` ends first.
    pub async fn run_cancelable_task(&self, scope: Scope, task: TaskRef) -> ResultFuture {
        let (job, result) = job::cancelable_task(scope, task);
        self.dispatch(job).await;
        result
    }

    /// [`WorkerPool::run_cancelable_task`] with a scope that times out after `timeout`.
    pub async fn run_time_limit_task(&self, timeout: Duration, task: TaskRef) -> ResultFuture {
        self.run_cancelable_task(Scope::with_timeout(timeout), task)
            .await
    }

    /// Runs `f` every `interval` on one worker until `scope` ends or `f` aborts.
    ///
    /// The worker stays occupied for the lifetime of the loop.
    pub async fn run_cancelable_interval<F, Fut>(
        &self,
        scope: Scope,
        interval: Duration,
        f: F,
    ) -> Done
    where
        F: FnMut(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (job, done) = job::interval(scope, interval, interval, f);
        self.dispatch(job).await;
        done
    }

    /// Runs `f` every `interval` until `timeout` elapses or `f` aborts.
    pub async fn run_time_limit_interval<F, Fut>(
        &self,
        interval: Duration,
        timeout: Duration,
        f: F,
    ) -> Done
    where
        F: FnMut(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let scope = Scope::with_timeout(timeout);
        let f = job::cancel_when_done(scope.clone(), f);
        self.run_cancelable_interval(scope, interval, f).await
    }
}
