//! Run helpers.
//!
//! Every helper exists in two flavors: detached (free functions here, spawned straight on the
//! tokio runtime) and pooled (methods on [`WorkerPool`](crate::WorkerPool)). Both are built from
//! the same jobs.
//!
//! ```text
//! run / run_cancelable / run_time_limit            ──► Done
//! run_task / run_cancelable_task / run_time_limit_task ──► ResultFuture
//! run_cancelable_interval / run_time_limit_interval ──► Done   (periodic, Context per call)
//! run_until_cancel / run_until_timeout              ──► Done   (back-to-back loop)
//! do_* ──► same loops, awaited in the caller's task
//! do_all / do_any / run_all / run_any (+ cancelable) ──► Result   (stop early)
//! ```
//!
//! ## Rules
//! - Ending a scope releases the waiter only; the work itself keeps running until it returns.
//! - Loop callbacks get a frozen context for regular iterations and the live context for
//!   the single final call made after the scope ended.

mod combinator;
mod detached;
mod inline;
mod interval;
pub(crate) mod job;

pub use combinator::{
    do_all, do_any, do_cancelable_all, do_cancelable_any, run_all, run_any, run_cancelable_all,
    run_cancelable_any,
};
pub use detached::{
    ensure_done, ensure_run, run, run_cancelable, run_cancelable_interval, run_cancelable_task,
    run_task, run_time_limit, run_time_limit_interval, run_time_limit_task, run_until_cancel,
    run_until_timeout,
};
pub use inline::{do_cancelable, do_time_limit, do_until_cancel, do_until_timeout};
pub use interval::IntervalRunner;
