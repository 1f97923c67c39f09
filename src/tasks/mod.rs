//! Task definitions.
//!
//! This module provides the unit-of-work abstraction consumed by pools, groups and caches.
//!
//! ## Overview
//! ```text
//!  VoidTask / ErrTask / ValTask / TaskFn ──(normalize)──► TaskResult
//!                 │
//!                 └──► TaskRef = Arc<dyn Task>  ──► WorkerPool / Group / CacheGroup
//! ```
//!
//! ## Contents
//! - [`Task`]       async trait with `run() -> TaskResult`
//! - [`TaskRef`]    shared handle (`Arc<dyn Task>`)
//! - [`TaskResult`] value + error + wait flags, with typed accessors
//! - [`TaskFn`], [`VoidTask`], [`ErrTask`], [`ValTask`] closure-backed tasks

mod result;
mod task;
mod task_fn;

pub use result::{AnyValue, TaskResult};
pub use task::{Task, TaskRef};
pub use task_fn::{ErrTask, TaskFn, ValTask, VoidTask};
