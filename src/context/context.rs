//! # Execution context for repeating work.
//!
//! A [`Context`] is handed to every invocation of an interval or loop callback. It combines
//! an optional [`Scope`] (owned by the caller) with two pieces of state owned by the work itself:
//!
//! - an **aborted** flag, set only through [`Context::abort`];
//! - an iteration **count**, incremented once per loop iteration (first iteration is `1`).
//!
//! `done() = canceled() || timeout() || aborted()`.
//!
//! ## Snapshots
//! The caller's scope can end while a callback body is executing. A callback written as
//! `if ctx.done() { cleanup() }` must not observe two different verdicts within one call,
//! so loops pass a frozen view created by [`Context::freeze`]: its `done` verdict is fixed
//! for the duration of that invocation (only `abort()` from inside the body can flip it).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::context::scope::Scope;
use crate::error::TaskError;

#[derive(Debug, Default)]
struct Shared {
    aborted: AtomicBool,
    count: AtomicU64,
}

/// Cancelable, abortable handle passed into repeating work.
///
/// Clones share the abort flag and the counter.
#[derive(Clone, Debug)]
pub struct Context {
    scope: Option<Scope>,
    shared: Arc<Shared>,
    frozen: Option<bool>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Context {
    /// Creates a live context. Without a scope it can only end through [`Context::abort`].
    pub fn new(scope: Option<Scope>) -> Self {
        Self {
            scope,
            shared: Arc::new(Shared::default()),
            frozen: None,
        }
    }

    /// Returns a snapshot view sharing this context's abort flag and counter.
    ///
    /// ### Parameters
    /// - `done = false`: the view reports `done()` only if aborted; `canceled()`, `timeout()`
    ///   and `error()` read through to the scope only in that case.
    /// - `done = true`: the view reports `done()` unconditionally.
    pub fn freeze(&self, done: bool) -> Context {
        Context {
            scope: self.scope.clone(),
            shared: Arc::clone(&self.shared),
            frozen: Some(done),
        }
    }

    /// True if the work should stop: the scope ended or the work aborted itself.
    pub fn done(&self) -> bool {
        match self.frozen {
            Some(done) => done || self.aborted(),
            None => self.scope_done() || self.aborted(),
        }
    }

    /// True if the scope was cancelled.
    pub fn canceled(&self) -> bool {
        self.visible() && self.scope.as_ref().is_some_and(Scope::is_canceled)
    }

    /// True if the scope hit its deadline.
    pub fn timeout(&self) -> bool {
        self.visible() && self.scope.as_ref().is_some_and(Scope::is_timeout)
    }

    /// True if the work called [`Context::abort`].
    #[inline]
    pub fn aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }

    /// Stops the enclosing loop after the current iteration.
    pub fn abort(&self) {
        self.shared.aborted.store(true, Ordering::Release);
    }

    /// Iterations started so far, counting from `1`.
    #[inline]
    pub fn count(&self) -> u64 {
        self.shared.count.load(Ordering::Acquire)
    }

    /// The scope's error (`Canceled` / `DeadlineExceeded`), if it ended.
    pub fn error(&self) -> Option<TaskError> {
        if !self.visible() {
            return None;
        }
        self.scope.as_ref().and_then(Scope::err)
    }

    /// The caller's scope, if any.
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub(crate) fn incr_count(&self) -> u64 {
        self.shared.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn scope_done(&self) -> bool {
        self.scope.as_ref().is_some_and(Scope::is_done)
    }

    fn visible(&self) -> bool {
        self.frozen.is_none() || self.done()
    }
}
