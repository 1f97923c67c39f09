//! # Batching executor.
//!
//! [`TickerExecutor`] buffers items and hands the whole buffer to an async handler whenever
//! its [`Ticker`] fires: "flush every N items or every T, whichever comes first".
//!
//! ## Rules
//! - Flushes are serialized: the buffer lock is held while the handler runs.
//! - `close` flushes what is left, once; later `add` calls are rejected.
//! - Dropping the executor without `close` discards the buffer.
//! - Handler panics are not caught; a panic in a triggered flush stops further triggered flushes.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ticker::option::TickerOption;
use crate::ticker::ticker::Ticker;

type BatchHandler<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, ()> + Send + Sync>;

struct Buffer<T> {
    items: Vec<T>,
    closed: bool,
}

struct Inner<T> {
    buffer: Mutex<Buffer<T>>,
    ticker: Ticker,
    handler: BatchHandler<T>,
}

impl<T: Send + 'static> Inner<T> {
    async fn invoke_now(&self) -> usize {
        let mut buffer = self.buffer.lock().await;
        self.flush(&mut buffer).await
    }

    async fn flush(&self, buffer: &mut Buffer<T>) -> usize {
        if buffer.items.is_empty() {
            return 0;
        }
        let items = std::mem::take(&mut buffer.items);
        let n = items.len();
        self.ticker.reset_count();
        (self.handler)(items).await;
        n
    }

    async fn consume(self: Arc<Self>) {
        while self.ticker.recv().await.is_some() {
            self.invoke_now().await;
        }
    }
}

/// Accumulates items and flushes them in batches.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::{TickerExecutor, TickerOption};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let exec = TickerExecutor::new(
///     TickerOption::new(10, 100, Duration::from_secs(5)),
///     |batch: Vec<u32>| async move { println!("writing {} rows", batch.len()) },
/// );
///
/// assert!(exec.add(2, [1, 2]).await);
/// assert_eq!(exec.task_size().await, 2);
/// exec.close().await; // flushes [1, 2]
/// assert!(!exec.add(1, [3]).await);
/// # }
/// ```
pub struct TickerExecutor<T> {
    inner: Arc<Inner<T>>,
}

impl<T> std::fmt::Debug for TickerExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerExecutor")
            .field("ticker", &self.inner.ticker)
            .finish()
    }
}

impl<T: Send + 'static> TickerExecutor<T> {
    /// Starts the executor; `handler` receives each flushed batch.
    ///
    /// ### Notes
    /// - Panics if `option` is invalid.
    /// - Must be called from within a tokio runtime.
    pub fn new<F, Fut>(option: TickerOption, handler: F) -> Self
    where
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::new(Inner {
            buffer: Mutex::new(Buffer {
                items: Vec::new(),
                closed: false,
            }),
            ticker: Ticker::new(option),
            handler: Arc::new(move |items| handler(items).boxed()),
        });
        tokio::spawn(Arc::clone(&inner).consume());
        Self { inner }
    }

    /// Buffers `items` and adds `count` to the trigger counter.
    ///
    /// `count` is independent of the number of items so that callers can weigh entries.
    /// Returns `false` once closed.
    pub async fn add<I>(&self, count: u64, items: I) -> bool
    where
        I: IntoIterator<Item = T>,
    {
        let mut buffer = self.inner.buffer.lock().await;
        if buffer.closed {
            return false;
        }
        buffer.items.extend(items);
        self.inner.ticker.incr_count(count);
        true
    }

    /// Flushes the buffer now, regardless of the trigger. Returns the batch size.
    pub async fn invoke_now(&self) -> usize {
        self.inner.invoke_now().await
    }

    /// Buffered items not yet flushed.
    pub async fn task_size(&self) -> usize {
        self.inner.buffer.lock().await.items.len()
    }

    /// Stops the ticker and flushes the remaining items. Idempotent.
    pub async fn close(&self) {
        let mut buffer = self.inner.buffer.lock().await;
        if buffer.closed {
            return;
        }
        buffer.closed = true;
        self.inner.ticker.close();
        let flushed = self.inner.flush(&mut buffer).await;
        debug!(flushed, "ticker executor closed");
    }
}

impl<T> Drop for TickerExecutor<T> {
    fn drop(&mut self) {
        if let Ok(buffer) = self.inner.buffer.try_lock() {
            if !buffer.closed && !buffer.items.is_empty() {
                warn!(dropped = buffer.items.len(), "ticker executor dropped with buffered items");
            }
        }
        self.inner.ticker.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{Instant, sleep};

    type Batches = mpsc::UnboundedReceiver<(Vec<u32>, Instant)>;

    fn recording(option: TickerOption) -> (TickerExecutor<u32>, Batches) {
        let (tx, rx) = mpsc::unbounded_channel();
        let exec = TickerExecutor::new(option, move |batch| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((batch, Instant::now()));
            }
        });
        (exec, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn max_count_flushes_immediately() {
        let (exec, mut batches) = recording(TickerOption::new(2, 3, Duration::from_secs(10)));
        let start = Instant::now();

        exec.add(1, [1]).await;
        exec.add(2, [2, 3]).await;

        let (batch, at) = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1, 2, 3]);
        assert_eq!(at, start);
        assert_eq!(exec.task_size().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn period_flushes_after_min_count() {
        let (exec, mut batches) = recording(TickerOption::new(2, 100, Duration::from_secs(1)));
        let start = Instant::now();

        exec.add(1, [1]).await;
        sleep(Duration::from_millis(1200)).await;
        assert_eq!(exec.task_size().await, 1, "below min count at the 1s tick");

        exec.add(1, [2]).await;
        let (batch, at) = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1, 2]);
        assert_eq!(at - start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn weighted_count() {
        let (exec, mut batches) = recording(TickerOption::new(0, 10, Duration::ZERO));
        exec.add(10, [7]).await;
        assert_eq!(batches.recv().await.unwrap().0, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_now_and_close() {
        let (exec, mut batches) = recording(TickerOption::new(0, 100, Duration::from_secs(60)));

        assert_eq!(exec.invoke_now().await, 0);
        exec.add(2, [1, 2]).await;
        assert_eq!(exec.invoke_now().await, 2);
        assert_eq!(batches.recv().await.unwrap().0, vec![1, 2]);

        exec.add(1, [3]).await;
        exec.close().await;
        exec.close().await;
        assert!(!exec.add(1, [4]).await);

        assert_eq!(batches.recv().await.unwrap().0, vec![3]);
        assert!(batches.try_recv().is_err());
    }
}
