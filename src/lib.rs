//! # taskhive
//!
//! **Taskhive** is an async task execution engine on top of tokio.
//!
//! It bounds how much work runs at once, fans tasks out and gathers their results,
//! suppresses duplicate work per key, and drives keyed timers and batching tickers.
//! Cancellation is cooperative everywhere: ending a [`Scope`] releases whoever waits on it,
//! it never interrupts work that is already running.
//!
//! ## Architecture
//! ```text
//!   Task / closure ──► TaskRef ─┬─► run_* helpers ───────────► Done / ResultFuture
//!                               │      (detached or pooled)
//!                               ├─► WorkerPool ─► core + assist workers (bounded queue)
//!                               ├─► Group ──────► GroupResult (by submission index)
//!                               └─► CacheGroup ─► one execution per key, shared result
//!
//!   TimerExecutor ─► control loop ─► hashed wheel ─► handler(key, value)
//!   TickerExecutor ─► Ticker (max count | period + min count) ─► handler(batch)
//!   TaskRunner ─► BgTask::run(scope) ─► Done ─► after-stop hook
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / functions                         |
//! |-------------------|-------------------------------------------------------------------|-----------------------------------------------|
//! | **Tasks**         | Units of work and their outcome with typed accessors.             | [`Task`], [`TaskRef`], [`TaskResult`]         |
//! | **Context**       | Cancellation scopes and the per-iteration loop context.           | [`Scope`], [`Context`], [`Done`]              |
//! | **Run helpers**   | Detached, cancelable, time-limited and periodic execution.        | [`run_cancelable_interval`], [`IntervalRunner`] |
//! | **Pool**          | Bounded concurrency with elastic assist workers.                  | [`WorkerPool`], [`PoolConfig`]                |
//! | **Groups**        | Fan-out with partial results and single-flight caching.           | [`Group`], [`GroupResult`], [`CacheGroup`]    |
//! | **Timers**        | Keyed delayed/cyclic callbacks on a hashed wheel.                 | [`TimerExecutor`], [`TimerConfig`]            |
//! | **Batching**      | Flush every N items or every T, whichever first.                  | [`TickerExecutor`], [`Ticker`]                |
//! | **Lifecycle**     | Start/stop wrappers for long-running background work.             | [`TaskRunner`], [`RunnerGroup`], [`BgTask`]   |
//! | **Combinators**   | All/any over fallible work, sequential or parallel.              | [`run_all`], [`run_any`], [`do_all`]          |
//! | **Retry**         | Backoff with jitter; one call per period.                         | [`do_retry`], [`BackoffPolicy`], [`PeriodBarrier`] |
//! | **Errors**        | Typed errors for task outcomes, submission and shutdown.          | [`TaskError`], [`SubmitError`], [`PoolError`] |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskhive::{Group, TaskError, ValTask, WorkerPool};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = WorkerPool::new(2, 4, 16);
//!     let group = Group::new().with_pool(pool.clone());
//!
//!     for i in 0..8i64 {
//!         group
//!             .run_time_limit_task(
//!                 Duration::from_secs(1),
//!                 ValTask::arc(move || async move { Ok::<_, TaskError>(i * i) }),
//!             )
//!             .await;
//!     }
//!
//!     let result = group.wait().await;
//!     assert_eq!(result.len(), 8);
//!     assert_eq!(result.get(3).map(|r| r.i64()), Some(Ok(9)));
//!
//!     pool.close_with_timeout(Duration::from_secs(1)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod context;
mod error;
mod group;
mod policies;
mod pool;
mod run;
mod runner;
mod tasks;
mod ticker;
mod timer;

// ---- Public re-exports ----

pub use config::{PoolConfig, TimerConfig};
pub use context::{Context, Done, DoneSignal, ResultFuture, Scope};
pub use error::{PoolError, SubmitError, TaskError};
pub use group::{CacheGroup, Group, GroupResult};
pub use policies::{BackoffPolicy, JitterPolicy, PeriodBarrier, do_retry, do_retry_cancelable};
pub use pool::WorkerPool;
pub use run::{
    IntervalRunner, do_all, do_any, do_cancelable, do_cancelable_all, do_cancelable_any,
    do_time_limit, do_until_cancel, do_until_timeout, ensure_done, ensure_run, run, run_all,
    run_any, run_cancelable, run_cancelable_all, run_cancelable_any, run_cancelable_interval,
    run_cancelable_task, run_task, run_time_limit, run_time_limit_interval, run_time_limit_task,
    run_until_cancel, run_until_timeout,
};
pub use runner::{BgTask, BgTaskFn, Runner, RunnerGroup, TaskRunner};
pub use tasks::{AnyValue, ErrTask, Task, TaskFn, TaskRef, TaskResult, ValTask, VoidTask};
pub use ticker::{Ticker, TickerExecutor, TickerOption};
pub use timer::{TimerBuilder, TimerExecutor};
