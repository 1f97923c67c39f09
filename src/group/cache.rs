//! # Single-flight cache.
//!
//! [`CacheGroup`] runs a task at most once per key and shares its result with every caller
//! asking for the same key: the first caller executes, concurrent and later callers wait for
//! (or read) the published result. Entries live until [`CacheGroup::del`].
//!
//! ```text
//! run("k", t) ─► holders["k"]? ──yes──► wait for holder ─► result
//!                     │no
//!                     └─► insert holder, unlock, t.run() ─► publish ─► result
//! ```
//!
//! ## Rules
//! - The map lock is released before the task runs; unrelated keys never wait on each other.
//! - If the executing caller is dropped, waiters get a canceled result instead of hanging.
//! - A task panic reaches waiters as a panicked result and keeps unwinding in the executing
//!   caller.
//! - `del` does not cancel an in-flight execution.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::pool::worker::panic_message;
use crate::tasks::{TaskRef, TaskResult};

#[derive(Debug)]
struct Holder {
    result: watch::Sender<Option<TaskResult>>,
}

impl Holder {
    fn new() -> Self {
        let (result, _) = watch::channel(None);
        Self { result }
    }

    fn current(&self) -> Option<TaskResult> {
        self.result.borrow().clone()
    }

    async fn wait(&self) -> TaskResult {
        let mut rx = self.result.subscribe();
        let published = rx.wait_for(Option::is_some).await.map(|r| r.clone());
        match published {
            Ok(Some(result)) => result,
            _ => TaskResult::interrupted(TaskError::Canceled),
        }
    }
}

/// Publishes a canceled result if the executing caller goes away before finishing.
struct Publisher<'a> {
    key: &'a str,
    holder: Arc<Holder>,
    published: bool,
}

impl Publisher<'_> {
    fn publish(mut self, result: TaskResult) {
        self.holder.result.send_replace(Some(result));
        self.published = true;
    }
}

impl Drop for Publisher<'_> {
    fn drop(&mut self) {
        if !self.published {
            debug!(key = self.key, "cache execution dropped before publishing");
            self.holder
                .result
                .send_replace(Some(TaskResult::interrupted(TaskError::Canceled)));
        }
    }
}

enum Role {
    Wait(Arc<Holder>),
    Execute(Arc<Holder>),
}

/// Per-key duplicate-suppressing execution cache.
///
/// # Example
/// ```
/// use taskhive::{CacheGroup, TaskError, ValTask};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = CacheGroup::new();
/// let load = ValTask::arc(|| async { Ok::<_, TaskError>(String::from("v1")) });
///
/// assert_eq!(cache.run("user:1", load.clone()).await.string(), Ok("v1".into()));
/// assert!(cache.contains("user:1"));
/// assert!(cache.del("user:1").is_some());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CacheGroup {
    holders: Mutex<HashMap<String, Arc<Holder>>>,
}

impl CacheGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn holders(&self) -> MutexGuard<'_, HashMap<String, Arc<Holder>>> {
        self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached result for `key`, running `task` if no entry exists yet.
    ///
    /// ### Notes
    /// - Panics if `key` is empty.
    pub async fn run(&self, key: &str, task: TaskRef) -> TaskResult {
        assert!(!key.is_empty(), "key is empty");

        let role = {
            let mut holders = self.holders();
            match holders.get(key) {
                Some(holder) => Role::Wait(Arc::clone(holder)),
                None => {
                    let holder = Arc::new(Holder::new());
                    holders.insert(key.to_owned(), Arc::clone(&holder));
                    Role::Execute(holder)
                }
            }
        };

        match role {
            Role::Wait(holder) => holder.wait().await,
            Role::Execute(holder) => {
                let publisher = Publisher {
                    key,
                    holder,
                    published: false,
                };
                let result = match AssertUnwindSafe(task.run()).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => {
                        let info = panic_message(panic.as_ref());
                        warn!(key, panic = %info, "cache task panicked");
                        publisher.publish(TaskResult::from_error(TaskError::Panicked { info }));
                        resume_unwind(panic);
                    }
                };
                publisher.publish(result.clone());
                result
            }
        }
    }

    /// Returns the result for `key`, waiting if its execution is still in flight.
    ///
    /// `None` if the key has no entry. Never starts an execution.
    pub async fn get(&self, key: &str) -> Option<TaskResult> {
        let holder = self.holders().get(key).cloned()?;
        Some(holder.wait().await)
    }

    /// Removes the entry for `key` and returns its result.
    ///
    /// Returns `None` if the key is absent or its execution has not published yet; that
    /// execution keeps running and still answers the callers already waiting on it.
    pub fn del(&self, key: &str) -> Option<TaskResult> {
        let holder = self.holders().remove(key)?;
        holder.current()
    }

    /// Number of entries, in flight or published.
    pub fn len(&self) -> usize {
        self.holders().len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.holders().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskFn, ValTask};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn counting(calls: &Arc<AtomicUsize>, delay: Duration) -> TaskRef {
        let calls = Arc::clone(calls);
        ValTask::arc(move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                sleep(delay).await;
                Ok::<_, TaskError>(n)
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn single_flight_across_keys() {
        let cache = Arc::new(CacheGroup::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let task = counting(&calls, Duration::from_millis(100));

        let mut handles = Vec::with_capacity(10_000);
        for i in 0..10_000 {
            let cache = Arc::clone(&cache);
            let task = Arc::clone(&task);
            handles.push(tokio::spawn(async move {
                let key = format!("key-{}", i % 100);
                cache.run(&key, task).await
            }));
        }

        let mut by_key: HashMap<usize, usize> = HashMap::new();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap();
            let n = result.get::<usize>().unwrap();
            assert_eq!(*by_key.entry(i % 100).or_insert(n), n);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 100);
        assert_eq!(cache.len(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn get_and_del() {
        let cache = CacheGroup::new();
        let calls = Arc::new(AtomicUsize::new(0));
        assert!(cache.get("a").await.is_none());

        let r = cache.run("a", counting(&calls, Duration::ZERO)).await;
        assert_eq!(r.get::<usize>(), Ok(1));
        assert_eq!(cache.get("a").await.and_then(|r| r.get::<usize>().ok()), Some(1));

        let r = cache.run("a", counting(&calls, Duration::ZERO)).await;
        assert_eq!(r.get::<usize>(), Ok(1), "cached, not re-executed");

        assert!(cache.del("a").is_some());
        assert!(cache.del("a").is_none());
        let r = cache.run("a", counting(&calls, Duration::ZERO)).await;
        assert_eq!(r.get::<usize>(), Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn del_in_flight_returns_none() {
        let cache = Arc::new(CacheGroup::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cache);
        let task = counting(&calls, Duration::from_secs(1));
        let running = tokio::spawn(async move { c.run("k", task).await });

        sleep(Duration::from_millis(10)).await;
        assert!(cache.del("k").is_none());
        assert_eq!(running.await.unwrap().get::<usize>(), Ok(1));
        assert!(!cache.contains("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_executor_releases_waiters() {
        let cache = Arc::new(CacheGroup::new());
        let slow: TaskRef = TaskFn::arc(|| async {
            sleep(Duration::from_secs(60)).await;
            TaskResult::ok(1i32)
        });

        let c = Arc::clone(&cache);
        let s = Arc::clone(&slow);
        let executor = tokio::spawn(async move { c.run("k", s).await });
        sleep(Duration::from_millis(10)).await;

        let c = Arc::clone(&cache);
        let waiter = tokio::spawn(async move { c.run("k", slow).await });
        sleep(Duration::from_millis(10)).await;

        executor.abort();
        let r = waiter.await.unwrap();
        assert!(r.canceled());
    }

    #[tokio::test(start_paused = true)]
    async fn panic_reaches_executor_and_waiters() {
        let cache = Arc::new(CacheGroup::new());
        let boom: TaskRef = TaskFn::arc(|| async {
            sleep(Duration::from_millis(50)).await;
            if true {
                panic!("boom");
            }
            TaskResult::empty()
        });

        let c = Arc::clone(&cache);
        let b = Arc::clone(&boom);
        let executor = tokio::spawn(async move { c.run("k", b).await });
        sleep(Duration::from_millis(10)).await;

        let c = Arc::clone(&cache);
        let waiter = tokio::spawn(async move { c.run("k", boom).await });

        assert!(executor.await.unwrap_err().is_panic());
        let r = waiter.await.unwrap();
        assert!(matches!(r.error(), Some(TaskError::Panicked { .. })));
        assert!(matches!(
            cache.get("k").await.as_ref().and_then(TaskResult::error),
            Some(TaskError::Panicked { .. })
        ));
    }

    #[tokio::test]
    #[should_panic(expected = "key is empty")]
    async fn empty_key_panics() {
        let cache = CacheGroup::new();
        cache
            .run("", TaskFn::arc(|| async { TaskResult::empty() }))
            .await;
    }
}
