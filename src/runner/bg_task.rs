use std::sync::Arc;

use crate::context::{Done, Scope};
use crate::error::TaskError;

/// Long-running background operation hosted by a [`TaskRunner`](crate::TaskRunner).
///
/// ### Contract
/// - `run` must not block: it sets the work up, spawns it and returns its [`Done`].
/// - The work watches `scope` and resolves its `Done` promptly once the scope ends.
/// - `Done` resolves exactly once, also on natural completion.
/// - `Err` means the work could not be started; nothing is left running.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use taskhive::{BgTask, Done, Scope, TaskError, run_cancelable_interval};
///
/// struct Refresh;
///
/// impl BgTask for Refresh {
///     fn run(&self, scope: Scope) -> Result<Done, TaskError> {
///         Ok(run_cancelable_interval(scope, Duration::from_secs(5), |_ctx| async {
///             // renew a lease
///         }))
///     }
/// }
/// ```
pub trait BgTask: Send + Sync + 'static {
    fn run(&self, scope: Scope) -> Result<Done, TaskError>;
}

/// Closure-backed [`BgTask`].
pub struct BgTaskFn<F> {
    f: F,
}

impl<F> BgTaskFn<F>
where
    F: Fn(Scope) -> Result<Done, TaskError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F> BgTask for BgTaskFn<F>
where
    F: Fn(Scope) -> Result<Done, TaskError> + Send + Sync + 'static,
{
    fn run(&self, scope: Scope) -> Result<Done, TaskError> {
        (self.f)(scope)
    }
}
