//! # Function-backed tasks
//!
//! Closure wrappers implementing [`Task`]. Each wraps `F: Fn() -> Fut`, producing a fresh
//! future per run; shared state must be captured explicitly (`Arc<...>`).
//!
//! | Wrapper      | Closure output             | Normalized result                |
//! |--------------|----------------------------|----------------------------------|
//! | [`TaskFn`]   | `TaskResult`               | as returned                      |
//! | [`VoidTask`] | `()`                       | `TaskResult::empty()`            |
//! | [`ErrTask`]  | `Result<(), TaskError>`    | empty or `from_error`            |
//! | [`ValTask`]  | `Result<T, TaskError>`     | `ok(value)` or `from_error`      |
//!
//! ## Example
//! ```rust
//! use taskhive::{TaskError, TaskRef, ValTask};
//!
//! let t: TaskRef = ValTask::arc(|| async { Ok::<_, TaskError>(7i32) });
//! # let _ = t;
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::result::TaskResult;
use crate::tasks::task::Task;

macro_rules! closure_task {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name<F> {
            f: F,
        }

        impl<F> $name<F> {
            /// Wraps the closure.
            pub fn new(f: F) -> Self {
                Self { f }
            }

            /// Wraps the closure and returns it as a shared handle.
            pub fn arc(f: F) -> Arc<Self> {
                Arc::new(Self::new(f))
            }
        }
    };
}

closure_task!(
    /// Task whose closure returns a [`TaskResult`] directly.
    TaskFn
);
closure_task!(
    /// Task whose closure returns nothing.
    VoidTask
);
closure_task!(
    /// Task whose closure returns only an error.
    ErrTask
);
closure_task!(
    /// Task whose closure returns a value or an error.
    ValTask
);

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn run(&self) -> TaskResult {
        (self.f)().await
    }
}

#[async_trait]
impl<F, Fut> Task for VoidTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn run(&self) -> TaskResult {
        (self.f)().await;
        TaskResult::empty()
    }
}

#[async_trait]
impl<F, Fut> Task for ErrTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self) -> TaskResult {
        match (self.f)().await {
            Ok(()) => TaskResult::empty(),
            Err(err) => TaskResult::from_error(err),
        }
    }
}

#[async_trait]
impl<F, Fut, T> Task for ValTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    T: Any + Send + Sync,
{
    async fn run(&self) -> TaskResult {
        match (self.f)().await {
            Ok(value) => TaskResult::ok(value),
            Err(err) => TaskResult::from_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskRef;

    #[tokio::test]
    async fn variants_normalize() {
        let t: TaskRef = VoidTask::arc(|| async {});
        let r = t.run().await;
        assert!(!r.has_error() && !r.has_value());

        let t: TaskRef = ErrTask::arc(|| async { Err(TaskError::fail("x")) });
        assert_eq!(t.run().await.error(), Some(&TaskError::fail("x")));

        let t: TaskRef = ValTask::arc(|| async { Ok::<_, TaskError>(5i64) });
        assert_eq!(t.run().await.i64(), Ok(5));

        let t: TaskRef = TaskFn::arc(|| async { TaskResult::ok("hi") });
        assert_eq!(t.run().await.string(), Ok("hi".into()));
    }

    #[tokio::test]
    async fn each_run_is_fresh() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let t = ValTask::arc(move || {
            let c = Arc::clone(&c);
            async move { Ok::<_, TaskError>(c.fetch_add(1, Ordering::SeqCst) + 1) }
        });

        assert_eq!(t.run().await.get::<usize>(), Ok(1));
        assert_eq!(t.run().await.get::<usize>(), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
