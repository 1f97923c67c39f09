//! # Period barrier.
//!
//! [`PeriodBarrier`] lets at most one invocation through per period. Callers that arrive
//! too early, or while another invocation is in progress, are turned away without waiting.
//!
//! ```text
//! call(f) ── in progress? ──yes──► None
//!               │no
//!               ├─ last finish < period ago ──► None
//!               └─ f() ──► stamp finish time ──► Some(out)
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// At most one invocation per period.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::PeriodBarrier;
///
/// let barrier = PeriodBarrier::new(Duration::from_secs(60));
/// assert_eq!(barrier.call(|| "flushed"), Some("flushed"));
/// assert_eq!(barrier.call(|| "flushed"), None);
/// ```
#[derive(Debug)]
pub struct PeriodBarrier {
    period: Duration,
    last_finish: Mutex<Option<Instant>>,
    invoking: AtomicBool,
}

/// Stamps the finish time and reopens the barrier, also on unwind.
struct Permit<'a>(&'a PeriodBarrier);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        *self
            .0
            .last_finish
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.0.invoking.store(false, Ordering::Release);
    }
}

impl PeriodBarrier {
    /// ### Notes
    /// - Panics if `period` is zero.
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "invalid period {period:?}");
        Self {
            period,
            last_finish: Mutex::new(None),
            invoking: AtomicBool::new(false),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn acquire(&self) -> Option<Permit<'_>> {
        let last = *self
            .last_finish
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|at| at.elapsed() < self.period) {
            trace!("period barrier closed");
            return None;
        }
        self.invoking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Permit(self))
    }

    /// Calls `f` if the barrier is open; `None` otherwise.
    pub fn call<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let _permit = self.acquire()?;
        Some(f())
    }

    /// Async [`call`](Self::call); the barrier stays closed until the future completes.
    pub async fn run<F, Fut>(&self, f: F) -> Option<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _permit = self.acquire()?;
        Some(f().await)
    }
}
