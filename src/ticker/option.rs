use std::time::Duration;

/// Slack subtracted from `period` when deriving the default `min_delay`.
const TICK_JITTER: Duration = Duration::from_millis(100);

/// Trigger thresholds of a [`Ticker`](crate::Ticker).
///
/// A tick fires when either:
/// - the accumulated count reaches `max_count` (immediately), or
/// - a periodic tick sees `count >= min_count` and at least `min_delay` since the last fire.
///
/// Zero disables the corresponding threshold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickerOption {
    /// Periodic check interval (0 = count-driven only).
    pub period: Duration,
    /// Minimum time since the last fire before a periodic tick may fire.
    pub min_delay: Duration,
    pub min_count: u64,
    pub max_count: u64,
}

impl TickerOption {
    pub fn new(min_count: u64, max_count: u64, period: Duration) -> Self {
        Self {
            period,
            min_count,
            max_count,
            ..Self::default()
        }
    }

    /// Validates the thresholds and fills in `min_delay`.
    ///
    /// `min_delay` defaults to `period - 100ms` (or `period` below 100ms) to absorb tick jitter.
    ///
    /// ### Notes
    /// - Panics if `min_count > max_count` or if every threshold is zero.
    pub fn normalize(mut self) -> Self {
        assert!(
            self.min_count <= self.max_count,
            "min count {} must be <= max count {}",
            self.min_count,
            self.max_count
        );
        assert!(
            self.min_count > 0 || self.max_count > 0 || !self.period.is_zero(),
            "min count, max count and period must not all be zero"
        );

        if !self.period.is_zero() && self.min_delay.is_zero() {
            self.min_delay = if self.period < TICK_JITTER {
                self.period
            } else {
                self.period - TICK_JITTER
            };
        }
        self
    }
}
