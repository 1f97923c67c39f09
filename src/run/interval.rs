//! # Interval runner.
//!
//! [`IntervalRunner`] configures a periodic loop beyond what
//! [`run_cancelable_interval`](crate::run_cancelable_interval) offers: an outer scope, an
//! overall timeout, a first-run delay, and a bound on the number of runs.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskhive::IntervalRunner;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // poll at most 3 times, first poll right away
//! IntervalRunner::new(Duration::from_millis(10))
//!     .with_init_delay(Duration::ZERO)
//!     .with_max_retry(2)
//!     .run(|_ctx| async {})
//!     .await;
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use crate::context::{Context, Done, Scope};
use crate::pool::WorkerPool;
use crate::run::job;

/// Builder for a bounded periodic loop.
#[derive(Clone, Debug)]
pub struct IntervalRunner {
    interval: Duration,
    timeout: Option<Duration>,
    init_delay: Duration,
    max_retry: Option<u64>,
    scope: Option<Scope>,
}

impl IntervalRunner {
    /// Loop running every `interval` (`> 0`). The first run waits one interval by default.
    pub fn new(interval: Duration) -> Self {
        assert!(!interval.is_zero(), "interval must be > 0");
        Self {
            interval,
            timeout: None,
            init_delay: interval,
            max_retry: None,
            scope: None,
        }
    }

    /// Stops the loop when `scope` ends.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Stops the loop after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Delay before the first run.
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Runs the callback at most `n + 1` times; the loop aborts after the last one.
    pub fn with_max_retry(mut self, n: u64) -> Self {
        self.max_retry = Some(n);
        self
    }

    /// Starts the loop detached.
    pub fn run<F, Fut>(self, f: F) -> Done
    where
        F: FnMut(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (job, done) = self.into_job(f);
        tokio::spawn(job);
        done
    }

    /// Starts the loop on one of `pool`'s workers.
    pub async fn run_on<F, Fut>(self, pool: &WorkerPool, f: F) -> Done
    where
        F: FnMut(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (job, done) = self.into_job(f);
        pool.dispatch(job).await;
        done
    }

    fn into_job<F, Fut>(self, mut f: F) -> (impl Future<Output = ()> + Send + 'static, Done)
    where
        F: FnMut(Context) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let base = self.scope.unwrap_or_default();
        let scope = match self.timeout {
            Some(timeout) => base.child_with_timeout(timeout),
            None => base.child(),
        };

        let mut retry = self.max_retry;
        let release = scope.clone();
        let bounded = move |ctx: Context| {
            let fut = f(ctx.clone());
            let last = match retry.as_mut() {
                Some(0) => true,
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            };
            let release = release.clone();
            async move {
                fut.await;
                if last && !ctx.done() {
                    ctx.abort();
                }
                if ctx.done() {
                    release.cancel();
                }
            }
        };

        job::interval(scope, self.interval, self.init_delay, bounded)
    }
}
