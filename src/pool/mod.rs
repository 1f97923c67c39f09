//! Bounded worker pool.
//!
//! ## Contents
//! - [`WorkerPool`] core/assist workers over a bounded queue, with drain-wait and close
//! - `gate` pending counter backing [`WorkerPool::wait`] and [`Group::wait`](crate::Group::wait)
//! - `worker` the worker loops

pub(crate) mod gate;
#[allow(clippy::module_inception)]
mod pool;
pub(crate) mod worker;

pub use pool::WorkerPool;
