//! Retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization that keeps concurrent retries apart
//! - [`do_retry`] / [`do_retry_cancelable`] retry loop driven by a backoff policy
//! - [`PeriodBarrier`] at most one invocation per period
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.

mod backoff;
mod barrier;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use barrier::PeriodBarrier;
pub use jitter::JitterPolicy;
pub use retry::{do_retry, do_retry_cancelable};
