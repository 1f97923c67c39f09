//! # Cancellation scope.
//!
//! [`Scope`] is a [`CancellationToken`] that also remembers **why** it ended:
//! an explicit [`Scope::cancel`] records [`TaskError::Canceled`], an expired deadline
//! records [`TaskError::DeadlineExceeded`].
//!
//! Scopes form a tree. A child ends when its parent ends; if the child did not end on its
//! own, it reports the reason inherited from the closest ancestor that did.
//!
//! ```text
//! root ──► child ──► child_with_timeout(5s)
//!   │                      └─ ends with DeadlineExceeded after 5s
//!   └─ cancel() ends every descendant with Canceled
//! ```
//!
//! ## Rules
//! - `err()` is `None` until the scope is done.
//! - Deadlines are driven by a tokio timer task, so timed scopes must be created inside a runtime.
//!   The timer lives as long as a handle to the scope (or to one of its children) does;
//!   a raw [`CancellationToken`] from [`Scope::token`] does not keep it alive.
//! - Ending a scope never interrupts running work; it only releases whoever waits on it.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndReason {
    Canceled,
    DeadlineExceeded,
}

impl EndReason {
    fn as_error(self) -> TaskError {
        match self {
            EndReason::Canceled => TaskError::Canceled,
            EndReason::DeadlineExceeded => TaskError::DeadlineExceeded,
        }
    }
}

/// Deadline timer task; aborted when the last scope handle drops.
#[derive(Debug)]
struct Deadline(AbortHandle);

impl Drop for Deadline {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Cancellation scope with a recorded end reason.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone, Debug)]
pub struct Scope {
    token: CancellationToken,
    reason: Arc<OnceLock<EndReason>>,
    parent: Option<Arc<Scope>>,
    deadline: Option<Arc<Deadline>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a root scope that ends only when cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            parent: None,
            deadline: None,
        }
    }

    /// Creates a root scope that ends with `DeadlineExceeded` after `timeout`.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().with_deadline(timeout)
    }

    /// Creates a child scope: it ends when `self` ends or when cancelled directly.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::new(OnceLock::new()),
            parent: Some(Arc::new(self.clone())),
            deadline: None,
        }
    }

    /// Creates a child scope that additionally ends with `DeadlineExceeded` after `timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        self.child().with_deadline(timeout)
    }

    fn with_deadline(mut self, timeout: Duration) -> Self {
        let token = self.token.clone();
        let reason = Arc::clone(&self.reason);
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = reason.set(EndReason::DeadlineExceeded);
                    token.cancel();
                }
            }
        });
        self.deadline = Some(Arc::new(Deadline(timer.abort_handle())));
        self
    }

    /// Ends the scope (and all its descendants) with `Canceled`.
    ///
    /// Calling it on an already ended scope keeps the first reason.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            let _ = self.reason.set(EndReason::Canceled);
        }
        self.token.cancel();
    }

    /// True once the scope has ended for any reason.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope has ended.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The reason the scope ended, or `None` while it is still live.
    pub fn err(&self) -> Option<TaskError> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(self.end_reason().as_error())
    }

    fn end_reason(&self) -> EndReason {
        if let Some(reason) = self.reason.get() {
            return *reason;
        }
        match &self.parent {
            Some(parent) if parent.is_done() => parent.end_reason(),
            _ => EndReason::Canceled,
        }
    }

    /// True if the scope ended by cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self.err(), Some(TaskError::Canceled))
    }

    /// True if the scope ended by its own (or an inherited) deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.err(), Some(TaskError::DeadlineExceeded))
    }

    /// Underlying token, for code that already speaks `tokio-util`.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_records_reason() {
        let scope = Scope::new();
        assert!(!scope.is_done());
        assert_eq!(scope.err(), None);

        scope.cancel();
        assert!(scope.is_done());
        assert!(scope.is_canceled());
        assert_eq!(scope.err(), Some(TaskError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_records_timeout() {
        let scope = Scope::with_timeout(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!scope.is_done());

        scope.cancelled().await;
        assert!(scope.is_timeout());

        scope.cancel();
        assert!(scope.is_timeout(), "first reason wins");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_timer_ends_with_last_handle() {
        let scope = Scope::with_timeout(Duration::from_secs(3600));
        let token = scope.token().clone();
        drop(scope);

        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(!token.is_cancelled(), "timer task was released");

        let scope = Scope::with_timeout(Duration::from_millis(100));
        let child = scope.child();
        let token = scope.token().clone();
        drop(scope);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(token.is_cancelled(), "child keeps the parent's deadline alive");
        assert!(child.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn child_inherits_parent_reason() {
        let parent = Scope::with_timeout(Duration::from_millis(10));
        let child = parent.child();
        let grandchild = child.child();

        grandchild.cancelled().await;
        assert!(child.is_timeout());
        assert!(grandchild.is_timeout());
    }

    #[tokio::test]
    async fn child_cancel_does_not_end_parent() {
        let parent = Scope::new();
        let child = parent.child();
        child.cancel();

        assert!(child.is_canceled());
        assert!(!parent.is_done());
    }
}
