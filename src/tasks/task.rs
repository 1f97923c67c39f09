//! # Task abstraction.
//!
//! This module defines the [`Task`] trait: an async unit of work producing a [`TaskResult`].
//! The common handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for sharing across
//! pools, groups and caches.
//!
//! Tasks are not handed a cancellation token: cancellation only ends the *caller's* wait.
//! Work that must stop early captures a [`Scope`](crate::Scope) itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tasks::result::TaskResult;

/// # Asynchronous unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use taskhive::{Task, TaskResult};
///
/// struct Answer;
///
/// #[async_trait]
/// impl Task for Answer {
///     async fn run(&self) -> TaskResult {
///         TaskResult::ok(42i32)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Executes the task to completion.
    ///
    /// May be called more than once (for example by a cache after eviction); every call
    /// should produce a fresh execution.
    async fn run(&self) -> TaskResult;
}

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Task>;
