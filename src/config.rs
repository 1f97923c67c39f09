//! # Engine configuration.
//!
//! [`PoolConfig`] sizes a [`WorkerPool`](crate::WorkerPool); [`TimerConfig`] shapes the
//! wheel of a [`TimerExecutor`](crate::TimerExecutor). Both are plain structs with public
//! fields and a `Default`; invalid combinations are asserted when the engine is built.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskhive::PoolConfig;
//!
//! let mut cfg = PoolConfig::default();
//! cfg.max_workers = 16;
//! cfg.queue_capacity = 0; // direct hand-off
//! cfg.idle_timeout = Duration::from_secs(2);
//!
//! assert_eq!(cfg.channel_capacity(), 1);
//! ```

use std::time::Duration;

/// Sizing of a worker pool.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Core workers started eagerly; they never exit until the pool is closed (`> 0`).
    pub min_workers: usize,
    /// Upper bound on live workers, core plus assist (`>= min_workers`).
    pub max_workers: usize,
    /// Bounded queue length (0 = single hand-off slot).
    pub queue_capacity: usize,
    /// How long an assist worker waits for work before exiting.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    /// - `min_workers = 1`
    /// - `max_workers = 8`
    /// - `queue_capacity = 64`
    /// - `idle_timeout = 10s`
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 8,
            queue_capacity: 64,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Creates a config with the given sizes and the default idle timeout.
    pub fn new(min_workers: usize, max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            queue_capacity,
            ..Self::default()
        }
    }

    /// Effective channel bound: tokio channels need at least one slot.
    #[inline]
    pub fn channel_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    pub(crate) fn validate(&self) {
        assert!(self.min_workers > 0, "min workers must be > 0");
        assert!(
            self.min_workers <= self.max_workers,
            "min workers must be <= max workers"
        );
    }
}

/// Shape of a hashed time wheel.
#[derive(Clone, Debug)]
pub struct TimerConfig {
    /// Tick length; also the firing precision (`> 0`).
    pub period: Duration,
    /// Number of buckets in the wheel (`> 0`).
    pub buckets: usize,
    /// Capacity of the request channel between callers and the control loop.
    pub request_capacity: usize,
}

impl Default for TimerConfig {
    /// - `period = 1s`
    /// - `buckets = 60`
    /// - `request_capacity = 64`
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            buckets: 60,
            request_capacity: 64,
        }
    }
}

impl TimerConfig {
    /// Wheel with the given tick and bucket count.
    pub fn new(period: Duration, buckets: usize) -> Self {
        Self {
            period,
            buckets,
            ..Self::default()
        }
    }

    /// Time covered by one full rotation.
    #[inline]
    pub fn span(&self) -> Duration {
        u32::try_from(self.buckets).map_or(Duration::MAX, |buckets| {
            self.period.saturating_mul(buckets)
        })
    }

    pub(crate) fn validate(&self) {
        assert!(!self.period.is_zero(), "timer period must be > 0");
        assert!(self.buckets > 0, "timer buckets must be > 0");
        assert!(self.request_capacity > 0, "request capacity must be > 0");
    }
}
