//! # Count- and time-triggered ticker.
//!
//! [`Ticker`] combines a counter with an optional periodic driver. Fires are published on a
//! single-slot channel read with [`Ticker::recv`].
//!
//! ```text
//! incr_count(n) ── count >= max ──────────────────────────┐
//!                                                         ▼
//! driver (every period) ── count >= min && since >= min_delay ──► try_send(now) ──► recv()
//!                                                         │
//!                                         slot full → fire dropped (coalesced)
//! ```
//!
//! ## Rules
//! - A successful fire subtracts the count it observed (never below zero) and stamps the
//!   last-fire time.
//! - A fire attempted while the previous one is still unread is dropped; the count stays.
//! - After close, `recv` returns `None` and the counter reads 0.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::ticker::option::TickerOption;

struct TickerShared {
    option: TickerOption,
    count: AtomicU64,
    last_fire: Mutex<Instant>,
    fires: mpsc::Sender<Instant>,
    closed: CancellationToken,
}

impl TickerShared {
    fn fire(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        let observed = self.count.load(Ordering::Acquire);
        if self.fires.try_send(now).is_err() {
            trace!("ticker fire coalesced");
            return false;
        }
        // The consumer may already have reset the count.
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(observed))
            });
        *self.last_fire.lock().unwrap_or_else(PoisonError::into_inner) = now;
        true
    }

    fn on_tick(&self) {
        let opt = &self.option;
        if opt.min_count > 0 && self.count.load(Ordering::Acquire) < opt.min_count {
            return;
        }
        if !opt.min_delay.is_zero() {
            let last = *self.last_fire.lock().unwrap_or_else(PoisonError::into_inner);
            if last.elapsed() < opt.min_delay {
                return;
            }
        }
        self.fire();
    }

    async fn drive(self: Arc<Self>) {
        let period = self.option.period;
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                _ = ticks.tick() => self.on_tick(),
            }
        }
    }
}

/// Fires when enough items accumulated or enough time passed.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::{Ticker, TickerOption};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ticker = Ticker::new(TickerOption::new(0, 3, Duration::ZERO));
/// ticker.incr_count(2);
/// assert_eq!(ticker.count(), 2);
/// ticker.incr_count(1);
///
/// assert!(ticker.recv().await.is_some());
/// assert_eq!(ticker.count(), 0);
/// ticker.close();
/// assert!(ticker.recv().await.is_none());
/// # }
/// ```
pub struct Ticker {
    shared: Arc<TickerShared>,
    rx: AsyncMutex<mpsc::Receiver<Instant>>,
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("option", &self.shared.option)
            .field("count", &self.count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Ticker {
    /// Creates a ticker; the periodic driver starts only when `option.period > 0`.
    ///
    /// ### Notes
    /// - Panics if `option` is invalid (see [`TickerOption::normalize`]).
    /// - With a period, must be called from within a tokio runtime.
    pub fn new(option: TickerOption) -> Self {
        let option = option.normalize();
        let (fires, rx) = mpsc::channel(1);
        let shared = Arc::new(TickerShared {
            option,
            count: AtomicU64::new(0),
            last_fire: Mutex::new(Instant::now()),
            fires,
            closed: CancellationToken::new(),
        });

        if !shared.option.period.is_zero() {
            tokio::spawn(Arc::clone(&shared).drive());
        }

        Self {
            shared,
            rx: AsyncMutex::new(rx),
        }
    }

    pub fn option(&self) -> &TickerOption {
        &self.shared.option
    }

    /// Waits for the next fire; `None` once closed.
    pub async fn recv(&self) -> Option<Instant> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            fired = rx.recv() => fired,
            _ = self.shared.closed.cancelled() => None,
        }
    }

    /// Adds `n` to the counter, firing at once when it reaches `max_count`.
    pub fn incr_count(&self, n: u64) {
        if n == 0 || self.is_closed() {
            return;
        }
        let prev = self
            .shared
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_add(n))
            })
            .unwrap_or_else(|count| count);
        let count = prev.saturating_add(n);
        let max = self.shared.option.max_count;
        if max > 0 && count >= max {
            self.shared.fire();
        }
    }

    pub fn reset_count(&self) {
        if !self.is_closed() {
            self.shared.count.store(0, Ordering::Release);
        }
    }

    /// Accumulated count; 0 once closed.
    pub fn count(&self) -> u64 {
        if self.is_closed() {
            return 0;
        }
        self.shared.count.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Stops the driver and ends `recv`. Idempotent.
    pub fn close(&self) {
        self.shared.closed.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test(start_paused = true)]
    async fn max_count_fires_immediately() {
        let ticker = Ticker::new(TickerOption::new(0, 3, Duration::from_secs(60)));
        let start = Instant::now();
        ticker.incr_count(1);
        ticker.incr_count(2);

        let at = ticker.recv().await.unwrap();
        assert_eq!(at, start);
        assert_eq!(ticker.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unread_fire_coalesces() {
        let ticker = Ticker::new(TickerOption::new(0, 1, Duration::ZERO));
        ticker.incr_count(1);
        ticker.incr_count(1);

        assert!(ticker.recv().await.is_some());
        assert!(timeout(Duration::from_millis(100), ticker.recv()).await.is_err());
        assert_eq!(ticker.count(), 1, "dropped fire keeps its count");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_fire_waits_for_min_count() {
        let ticker = Ticker::new(TickerOption::new(2, 10, Duration::from_secs(1)));
        let start = Instant::now();
        ticker.incr_count(1);

        sleep(Duration::from_millis(1500)).await;
        ticker.incr_count(1);

        let at = ticker.recv().await.unwrap();
        assert_eq!(at - start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_fire_respects_min_delay() {
        let ticker = Ticker::new(TickerOption::new(1, 3, Duration::from_secs(1)));
        let start = Instant::now();

        sleep(Duration::from_millis(500)).await;
        ticker.incr_count(3);
        assert!(ticker.recv().await.is_some());

        ticker.incr_count(1);
        let at = ticker.recv().await.unwrap();
        // tick at 1s is only 500ms after the last fire; tick at 2s fires
        assert_eq!(at - start, Duration::from_secs(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reset_never_underflows() {
        const ROUNDS: u64 = 200_000;
        let ticker = Arc::new(Ticker::new(TickerOption::new(0, 1, Duration::ZERO)));

        let consumer = {
            let ticker = Arc::clone(&ticker);
            tokio::spawn(async move {
                let mut max_seen = 0;
                while ticker.recv().await.is_some() {
                    ticker.reset_count();
                    max_seen = max_seen.max(ticker.count());
                }
                max_seen
            })
        };

        let producer = {
            let ticker = Arc::clone(&ticker);
            tokio::task::spawn_blocking(move || {
                let mut max_seen = 0;
                for _ in 0..ROUNDS {
                    ticker.incr_count(1);
                    max_seen = max_seen.max(ticker.count());
                }
                max_seen
            })
        };

        let produced_max = producer.await.unwrap();
        assert!(produced_max <= ROUNDS, "count wrapped: {produced_max}");
        assert!(ticker.count() <= ROUNDS);

        ticker.close();
        let consumed_max = consumer.await.unwrap();
        assert!(consumed_max <= ROUNDS, "count wrapped: {consumed_max}");
    }

    #[tokio::test(start_paused = true)]
    async fn close_ends_recv() {
        let ticker = Ticker::new(TickerOption::new(0, 0, Duration::from_secs(1)));
        ticker.close();
        ticker.close();
        ticker.incr_count(5);
        assert_eq!(ticker.count(), 0);
        assert!(ticker.recv().await.is_none());
    }
}
