//! # Retry delays.
//!
//! [`BackoffPolicy`] maps a retry number to a delay: `first × factor^retry`, capped at `max`,
//! then randomized by its [`JitterPolicy`]. The base delay depends on the retry number only,
//! so jitter never compounds across retries.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskhive::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(50),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(50));
//! assert_eq!(backoff.next(2), Duration::from_millis(200));
//! assert_eq!(backoff.next(5), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff with a cap and optional jitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
    /// Growth per retry (`1.0` = constant).
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms, capped at 30s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Constant delay without jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn next(&self, retry: u32) -> Duration {
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
