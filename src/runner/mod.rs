//! Lifecycle wrappers for long-running background work.
//!
//! ## Contents
//! - [`BgTask`] / [`BgTaskFn`] a non-blocking `run(scope) -> Done` operation
//! - [`TaskRunner`] stopped → running → stopped state machine around one `BgTask`
//! - [`RunnerGroup`] starts and stops many runners together
//! - [`Runner`] the start/stop/is_running contract shared by both

use async_trait::async_trait;

use crate::error::TaskError;

mod bg_task;
mod group;
mod task_runner;

pub use bg_task::{BgTask, BgTaskFn};
pub use group::RunnerGroup;
pub use task_runner::TaskRunner;

/// Something that can be started and stopped.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Starts the work unless it is already running.
    fn start(&self) -> Result<(), TaskError>;

    /// Stops the work and waits until it finished.
    async fn stop(&self);

    fn is_running(&self) -> bool;
}
