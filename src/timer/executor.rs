//! # Timer executor.
//!
//! [`TimerExecutor`] manages many keyed, delayed or cyclic callbacks on a hashed time wheel.
//! All wheel state is owned by a single control loop; callers only send requests.
//!
//! ```text
//! put / put_task / del ──► mpsc ──┐
//!                                 ▼
//!            ┌──────────── control loop ◄── tick every `period`
//!            │   wheel.insert / wheel.remove / wheel.tick
//!            ▼
//!  fired batch ──► tokio::spawn(handler(k, v) for each, sequentially)
//! ```
//!
//! ## Rules
//! - Precision is one period: `delay < period` fires within `[0, period]`,
//!   otherwise within `[delay, delay + period)`.
//! - A put for an armed key replaces it (last write wins).
//! - Cyclic timers are re-armed by the loop when they fire; a `del` stops them.
//! - A slow handler never stalls the tick loop. Handler panics are not caught.
//! - After close, `put`/`del` return `false`; on close the drain handler sees every timer still armed.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TimerConfig;
use crate::timer::wheel::Wheel;

type Handler<K, V> = Arc<dyn Fn(K, Option<V>) -> BoxFuture<'static, ()> + Send + Sync>;

fn boxed<K, V, F, Fut>(f: F) -> Handler<K, V>
where
    F: Fn(K, Option<V>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |key, value| f(key, value).boxed())
}

enum Request<K, V> {
    Put {
        key: K,
        value: Option<V>,
        delay: Duration,
        cyclic: bool,
    },
    Del(K),
}

/// Builder for [`TimerExecutor`].
pub struct TimerBuilder<K, V> {
    config: TimerConfig,
    on_closed: Option<Handler<K, V>>,
}

impl<K, V> TimerBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Runs `f` for every timer still armed when the executor closes.
    pub fn with_on_closed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(K, Option<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_closed = Some(boxed(f));
        self
    }

    /// Capacity of the request channel.
    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity;
        self
    }

    /// Starts the control loop.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    pub fn build<F, Fut>(self, handler: F) -> TimerExecutor<K, V>
    where
        F: Fn(K, Option<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.config.validate();

        let (tx, rx) = mpsc::channel(self.config.request_capacity);
        let closing = CancellationToken::new();
        let control = ControlLoop {
            wheel: Wheel::new(self.config.period, self.config.buckets),
            period: self.config.period,
            requests: rx,
            closing: closing.clone(),
            handler: boxed(handler),
            on_closed: self.on_closed,
        };
        let handle = tokio::spawn(control.run());
        debug!(
            period = ?self.config.period,
            buckets = self.config.buckets,
            "timer executor started"
        );

        TimerExecutor {
            config: self.config,
            requests: tx,
            closing,
            handle: Mutex::new(Some(handle)),
        }
    }
}

/// Keyed delayed/cyclic callbacks on a hashed time wheel.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::TimerExecutor;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let timers = TimerExecutor::<&'static str, u32>::new(
///     Duration::from_millis(10),
///     16,
///     |key, value| async move { println!("{key} expired with {value:?}") },
/// );
///
/// assert!(timers.put_task(Duration::from_millis(30), "session-1", 7, false).await);
/// assert!(timers.del("session-1").await);
/// timers.close().await;
/// assert!(!timers.put(Duration::from_millis(30), "session-2").await);
/// # }
/// ```
pub struct TimerExecutor<K, V> {
    config: TimerConfig,
    requests: mpsc::Sender<Request<K, V>>,
    closing: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> std::fmt::Debug for TimerExecutor<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerExecutor")
            .field("config", &self.config)
            .field("closed", &self.closing.is_cancelled())
            .finish()
    }
}

impl<K, V> TimerExecutor<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Starts configuring a wheel of `buckets` buckets ticking every `period`.
    pub fn builder(period: Duration, buckets: usize) -> TimerBuilder<K, V> {
        TimerBuilder {
            config: TimerConfig::new(period, buckets),
            on_closed: None,
        }
    }

    /// Shortcut for `builder(period, buckets).build(handler)`.
    pub fn new<F, Fut>(period: Duration, buckets: usize, handler: F) -> Self
    where
        F: Fn(K, Option<V>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::builder(period, buckets).build(handler)
    }

    /// Arms a one-shot timer without a value.
    pub async fn put(&self, delay: Duration, key: K) -> bool {
        self.request(Request::Put {
            key,
            value: None,
            delay,
            cyclic: false,
        })
        .await
    }

    /// Arms a timer carrying `value`; `cyclic` timers re-arm with the same delay after firing.
    ///
    /// Returns `false` once the executor is closed.
    ///
    /// ### Notes
    /// - Panics if `delay` is zero.
    pub async fn put_task(&self, delay: Duration, key: K, value: V, cyclic: bool) -> bool {
        self.request(Request::Put {
            key,
            value: Some(value),
            delay,
            cyclic,
        })
        .await
    }

    /// Cancels the timer for `key`, if any. Returns `false` once the executor is closed.
    pub async fn del(&self, key: K) -> bool {
        self.request(Request::Del(key)).await
    }

    async fn request(&self, req: Request<K, V>) -> bool {
        if let Request::Put { delay, .. } = &req {
            assert!(!delay.is_zero(), "delay must be > 0");
        }
        if self.closing.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.closing.cancelled() => false,
            res = self.requests.send(req) => res.is_ok(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Stops the loop and waits for the drain handler. Idempotent.
    pub async fn close(&self) {
        self.closing.cancel();
        let mut handle = self.handle.lock().await;
        if let Some(handle) = handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "timer control loop failed");
            }
        }
    }
}

impl<K, V> Drop for TimerExecutor<K, V> {
    fn drop(&mut self) {
        self.closing.cancel();
    }
}

struct ControlLoop<K, V> {
    wheel: Wheel<K, V>,
    period: Duration,
    requests: mpsc::Receiver<Request<K, V>>,
    closing: CancellationToken,
    handler: Handler<K, V>,
    on_closed: Option<Handler<K, V>>,
}

impl<K, V> ControlLoop<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    async fn run(mut self) {
        let mut next_tick = Instant::now() + self.period;

        loop {
            tokio::select! {
                biased;
                _ = self.closing.cancelled() => break,
                _ = sleep_until(next_tick) => {
                    next_tick += self.period;
                    self.on_tick(next_tick);
                }
                Some(req) = self.requests.recv() => {
                    let until_tick = next_tick.saturating_duration_since(Instant::now());
                    match req {
                        Request::Put { key, value, delay, cyclic } => {
                            self.wheel.insert(key, value, delay, cyclic, until_tick);
                        }
                        Request::Del(key) => {
                            self.wheel.remove(&key);
                        }
                    }
                }
            }
        }

        let pending = self.wheel.drain();
        debug!(pending = pending.len(), "timer executor closing");
        if let Some(on_closed) = &self.on_closed {
            for (key, value) in pending {
                on_closed(key, value).await;
            }
        }
        debug!("timer executor closed");
    }

    fn on_tick(&mut self, next_tick: Instant) {
        let fired = self.wheel.tick();
        if fired.is_empty() {
            return;
        }

        let until_tick = next_tick.saturating_duration_since(Instant::now());
        let mut batch = Vec::with_capacity(fired.len());
        for timer in fired {
            if timer.cyclic {
                self.wheel.insert(
                    timer.key.clone(),
                    timer.value.clone(),
                    timer.delay,
                    true,
                    until_tick,
                );
            }
            batch.push((timer.key, timer.value));
        }
        debug!(fired = batch.len(), armed = self.wheel.len(), "timer tick");

        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            for (key, value) in batch {
                handler(key, value).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    type Fires = UnboundedReceiver<(&'static str, Option<u32>, Instant)>;

    fn recording(period: Duration, buckets: usize) -> (TimerExecutor<&'static str, u32>, Fires) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = TimerExecutor::new(period, buckets, move |key, value| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((key, value, Instant::now()));
            }
        });
        (timers, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_within_one_period_after_delay() {
        let period = Duration::from_millis(100);
        let (timers, mut fires) = recording(period, 8);
        sleep(Duration::from_millis(30)).await;

        for (key, ms) in [("a", 250u64), ("b", 900), ("c", 2_000)] {
            let start = Instant::now();
            assert!(timers.put(Duration::from_millis(ms), key).await);
            let (fired, _, at) = fires.recv().await.unwrap();
            assert_eq!(fired, key);
            let elapsed = at - start;
            assert!(elapsed >= Duration::from_millis(ms), "{key} fired early: {elapsed:?}");
            assert!(elapsed <= Duration::from_millis(ms) + period, "{key} fired late: {elapsed:?}");
        }
        timers.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_delay_fires_within_period() {
        let period = Duration::from_millis(100);
        let (timers, mut fires) = recording(period, 4);
        sleep(Duration::from_millis(10)).await;

        let start = Instant::now();
        timers.put(Duration::from_millis(5), "a").await;
        let (_, _, at) = fires.recv().await.unwrap();
        assert!(at - start <= period);
        timers.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_does_not_delay_other_keys() {
        let period = Duration::from_millis(100);
        let (tx, mut fires) = mpsc::unbounded_channel();
        let timers = TimerExecutor::<&'static str, u32>::new(period, 8, move |key, _| {
            let tx = tx.clone();
            async move {
                if key == "a" {
                    sleep(period * 10).await;
                }
                let _ = tx.send((key, Instant::now()));
            }
        });
        sleep(Duration::from_millis(10)).await;

        let start = Instant::now();
        timers.put(period, "a").await;
        timers.put(period * 2, "b").await;

        let (key, at) = fires.recv().await.unwrap();
        assert_eq!(key, "b");
        let elapsed = at - start;
        assert!(elapsed >= period * 2, "b fired early: {elapsed:?}");
        assert!(elapsed < period * 3, "b waited for the slow handler: {elapsed:?}");

        let (key, _) = fires.recv().await.unwrap();
        assert_eq!(key, "a");
        timers.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn last_put_wins() {
        let (timers, mut fires) = recording(Duration::from_millis(50), 8);

        timers.put_task(Duration::from_millis(200), "k", 1, false).await;
        sleep(Duration::from_millis(100)).await;
        let start = Instant::now();
        timers.put_task(Duration::from_millis(300), "k", 2, false).await;

        let (key, value, at) = fires.recv().await.unwrap();
        assert_eq!((key, value), ("k", Some(2)));
        assert!(at - start >= Duration::from_millis(300));

        sleep(Duration::from_secs(2)).await;
        assert!(fires.try_recv().is_err(), "only one firing per key");
        timers.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cyclic_until_deleted() {
        let (timers, mut fires) = recording(Duration::from_millis(10), 16);
        timers.put_task(Duration::from_millis(50), "tick", 9, true).await;

        for _ in 0..3 {
            let (key, value, _) = fires.recv().await.unwrap();
            assert_eq!((key, value), ("tick", Some(9)));
        }
        assert!(timers.del("tick").await);

        sleep(Duration::from_millis(500)).await;
        assert!(fires.try_recv().is_err());
        timers.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_drains_pending_once() {
        let drained = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&drained);
        let timers = TimerExecutor::<u64, ()>::builder(Duration::from_millis(10), 8)
            .with_on_closed(move |_key, _value| {
                let d = Arc::clone(&d);
                async move {
                    d.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build(|_key, _value| async {});

        timers.put(Duration::from_secs(10), 1).await;
        timers.put(Duration::from_secs(20), 2).await;
        timers.put(Duration::from_secs(20), 3).await;
        timers.del(3).await;
        sleep(Duration::from_millis(5)).await;

        timers.close().await;
        timers.close().await;
        assert_eq!(drained.load(Ordering::SeqCst), 2);
        assert!(timers.is_closed());
        assert!(!timers.put(Duration::from_secs(1), 4).await);
        assert!(!timers.del(1).await);
    }
}
