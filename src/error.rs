//! Error types used by the taskhive engines and by tasks.
//!
//! This module defines three enums:
//!
//! - [`TaskError`]: the error carried inside a [`TaskResult`](crate::TaskResult).
//! - [`SubmitError`]: raised when work is handed to a [`WorkerPool`](crate::WorkerPool) that no longer accepts it.
//! - [`PoolError`]: raised by the pool shutdown path.
//!
//! All of them provide `as_label` (stable snake_case for logs/metrics) and `as_message` helpers.
//!
//! Programmer errors (negative sizes, empty keys, zero periods) are not represented here:
//! they are asserted at construction time and panic.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by task execution.
///
/// A task fails with [`TaskError::Fail`]. The caller-side outcomes of a bounded wait are
/// [`TaskError::Canceled`] and [`TaskError::DeadlineExceeded`]. Typed accessors on a
/// [`TaskResult`](crate::TaskResult) that hit a value of another type return [`TaskError::TypeCast`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The scope the caller was waiting on was cancelled.
    #[error("context cancelled")]
    Canceled,

    /// The scope the caller was waiting on hit its deadline.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The stored value does not have the requested type.
    #[error("type cast err")]
    TypeCast,

    /// The unit of work panicked and the panic was caught at a worker boundary.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    ///
    /// # Example
    /// ```
    /// use taskhive::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.to_string(), "execution failed: boom");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskhive::TaskError;
    ///
    /// assert_eq!(TaskError::DeadlineExceeded.as_label(), "task_deadline_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
            TaskError::DeadlineExceeded => "task_deadline_exceeded",
            TaskError::TypeCast => "task_type_cast",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::DeadlineExceeded => "context deadline exceeded".to_string(),
            TaskError::TypeCast => "type cast err".to_string(),
            TaskError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// True for the two caller-side outcomes (`Canceled`, `DeadlineExceeded`).
    pub fn is_scope_error(&self) -> bool {
        matches!(self, TaskError::Canceled | TaskError::DeadlineExceeded)
    }
}

/// Error returned by [`WorkerPool::submit`](crate::WorkerPool::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The pool is closed (or closing) and no longer accepts work.
    #[error("worker pool closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Closed => "submit_closed",
        }
    }
}

/// # Errors produced by the pool shutdown path.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Close timeout was exceeded; some workers were still running tasks.
    ///
    /// Those workers are not interrupted and keep running until their task returns.
    #[error("close timeout {grace:?} exceeded; pending tasks: {pending}")]
    GraceExceeded {
        /// The configured close timeout.
        grace: Duration,
        /// Number of tasks still in flight when the timeout expired.
        pending: usize,
    },
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskhive::PoolError;
    /// use std::time::Duration;
    ///
    /// let err = PoolError::GraceExceeded { grace: Duration::from_secs(5), pending: 2 };
    /// assert_eq!(err.as_label(), "pool_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::GraceExceeded { .. } => "pool_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PoolError::GraceExceeded { grace, pending } => {
                format!("grace exceeded after {grace:?}; pending tasks={pending}")
            }
        }
    }
}
