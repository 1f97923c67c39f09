use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::error::TaskError;
use crate::runner::Runner;

/// Set of runners started and stopped together.
///
/// A `RunnerGroup` is itself a [`Runner`], so groups nest.
#[derive(Default)]
pub struct RunnerGroup {
    runners: Mutex<Vec<Arc<dyn Runner>>>,
}

impl std::fmt::Debug for RunnerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerGroup")
            .field("len", &self.len())
            .finish()
    }
}

impl RunnerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn runners(&self) -> MutexGuard<'_, Vec<Arc<dyn Runner>>> {
        self.runners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `runner`; adding the same runner twice has no effect.
    pub fn add(&self, runner: Arc<dyn Runner>) -> &Self {
        let mut runners = self.runners();
        if !runners.iter().any(|r| Arc::ptr_eq(r, &runner)) {
            runners.push(runner);
        }
        self
    }

    /// Removes `runner` without stopping it.
    pub fn del(&self, runner: &Arc<dyn Runner>) -> &Self {
        self.runners().retain(|r| !Arc::ptr_eq(r, runner));
        self
    }

    pub fn len(&self) -> usize {
        self.runners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Runner>> {
        self.runners().clone()
    }
}

#[async_trait]
impl Runner for RunnerGroup {
    /// Starts every runner; returns the first start error after trying all of them.
    fn start(&self) -> Result<(), TaskError> {
        let mut first = None;
        for runner in self.snapshot() {
            if let Err(err) = runner.start() {
                warn!(error = %err, "runner failed to start");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Stops every runner concurrently.
    async fn stop(&self) {
        let runners = self.snapshot();
        join_all(runners.iter().map(|r| r.stop())).await;
    }

    /// `true` while any runner is running.
    fn is_running(&self) -> bool {
        self.snapshot().iter().any(|r| r.is_running())
    }
}
