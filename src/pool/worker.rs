//! Worker loops.
//!
//! ```text
//!            ┌────────── quit.cancelled() ──► exit
//! loop ──────┤
//!            └── queue.recv() ──► job ──► catch_unwind ──► gate.leave()
//!                  (assist: bounded by idle_timeout, exit when it elapses)
//! ```
//!
//! A running job is never interrupted; `quit` is only observed between jobs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error};

use crate::pool::pool::{Job, Shared};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerKind {
    /// Started with the pool; exits only on close.
    Core,
    /// Started under load; exits after `idle_timeout` without work.
    Assist,
}

impl WorkerKind {
    fn as_label(self) -> &'static str {
        match self {
            WorkerKind::Core => "core",
            WorkerKind::Assist => "assist",
        }
    }
}

pub(crate) fn spawn_worker(shared: &Arc<Shared>, kind: WorkerKind) {
    let id = shared.next_worker_id();
    tokio::spawn(worker_loop(Arc::clone(shared), kind, id));
}

async fn worker_loop(shared: Arc<Shared>, kind: WorkerKind, id: usize) {
    debug!(worker = id, kind = kind.as_label(), "worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = shared.quit.cancelled() => break,
            job = next_job(&shared, kind) => match job {
                Some(job) => job,
                None => break,
            },
        };
        run_job(&shared, job, id).await;
    }

    shared.workers.send_modify(|n| *n = n.saturating_sub(1));
    debug!(worker = id, kind = kind.as_label(), "worker exited");
}

async fn next_job(shared: &Shared, kind: WorkerKind) -> Option<Job> {
    let recv = async { shared.queue.lock().await.recv().await };
    match kind {
        WorkerKind::Core => recv.await,
        WorkerKind::Assist => tokio::time::timeout(shared.config.idle_timeout, recv)
            .await
            .ok()
            .flatten(),
    }
}

async fn run_job(shared: &Shared, job: Job, id: usize) {
    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
        error!(worker = id, panic = %panic_message(panic.as_ref()), "job panicked");
    }
    shared.gate.leave();
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
