//! # Jitter for retry delays.
//!
//! Randomizes a backoff delay so that many callers failing together do not retry in lockstep.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2` plus uniform in `[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] uniform in `[base, 3 × delay]`, capped

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    #[default]
    None,
    Full,
    Equal,
    /// Needs the base and cap as well; see [`JitterPolicy::apply_decorrelated`].
    Decorrelated,
}

fn random_ms(low: u64, high: u64) -> Duration {
    if low >= high {
        return Duration::from_millis(low);
    }
    Duration::from_millis(rand::rng().random_range(low..=high))
}

impl JitterPolicy {
    /// Randomizes `delay`. `Decorrelated` returns it unchanged.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => random_ms(0, ms),
            JitterPolicy::Equal => {
                let half = ms / 2;
                random_ms(half, ms)
            }
        }
    }

    /// Decorrelated jitter: uniform in `[base, min(3 × prev, max)]`.
    ///
    /// Other policies fall back to [`JitterPolicy::apply`] on `prev`.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(prev);
        }
        let base_ms = base.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(base_ms);
        random_ms(base_ms, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Duration = Duration::from_millis(1000);

    #[test]
    fn none_is_exact() {
        assert_eq!(JitterPolicy::None.apply(D), D);
        assert_eq!(JitterPolicy::default(), JitterPolicy::None);
    }

    #[test]
    fn bounds() {
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(D) <= D);
            let eq = JitterPolicy::Equal.apply(D);
            assert!(eq >= D / 2 && eq <= D);
            let dec = JitterPolicy::Decorrelated.apply_decorrelated(
                Duration::from_millis(100),
                D,
                Duration::from_secs(2),
            );
            assert!(dec >= Duration::from_millis(100) && dec <= Duration::from_secs(2));
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
