//! # All / any combinators.
//!
//! Coordinate a list of fallible units of work and stop as soon as the outcome is known.
//!
//! ```text
//!            sequential          parallel (shared child scope)
//! all   do_all / do_cancelable_all   run_all / run_cancelable_all   ──► first error
//! any   do_any / do_cancelable_any   run_any / run_cancelable_any   ──► first success | last error
//! ```
//!
//! ## Rules
//! - Sequential forms never start a unit before the previous one returned.
//! - Parallel forms start every unit, and end the shared scope once the outcome is decided.
//!   Units that have not started by then are skipped; running ones are only abandoned.
//! - "First" and "last" follow completion order.
//! - A panicking unit counts as [`TaskError::Panicked`].

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

use crate::context::Scope;
use crate::error::TaskError;
use crate::pool::worker::panic_message;

/// Awaits each future in turn; returns the first error.
///
/// # Example
/// ```
/// use futures::future::ready;
/// use taskhive::{TaskError, do_all};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let out = do_all([
///     ready(Ok(())),
///     ready(Err(TaskError::fail("disk full"))),
///     ready(Err(TaskError::fail("never checked"))),
/// ])
/// .await;
/// assert_eq!(out, Err(TaskError::fail("disk full")));
/// # }
/// ```
pub async fn do_all<I, Fut>(futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>>,
{
    for fut in futs {
        fut.await?;
    }
    Ok(())
}

/// Awaits each future in turn until one succeeds; otherwise returns the last error.
pub async fn do_any<I, Fut>(futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>>,
{
    let mut cause = None;
    for fut in futs {
        match fut.await {
            Ok(()) => return Ok(()),
            Err(err) => cause = Some(err),
        }
    }
    cause.map_or(Ok(()), Err)
}

/// [`do_all`] where each wait is abandoned once `scope` ends.
pub async fn do_cancelable_all<I, Fut>(scope: Scope, futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    for fut in futs {
        race(&scope, fut).await?;
    }
    Ok(())
}

/// [`do_any`] where each wait is abandoned once `scope` ends.
pub async fn do_cancelable_any<I, Fut>(scope: Scope, futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let mut cause = None;
    for fut in futs {
        match race(&scope, fut).await {
            Ok(()) => return Ok(()),
            Err(err) => cause = Some(err),
        }
    }
    cause.map_or(Ok(()), Err)
}

/// Runs all futures concurrently; returns the first error and stops waiting for the rest.
pub async fn run_all<I, Fut>(futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    run_cancelable_all(Scope::new(), futs).await
}

/// [`run_all`] under a child of `scope`.
pub async fn run_cancelable_all<I, Fut>(scope: Scope, futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let shared = scope.child();
    let mut set = spawn_all(&shared, futs);

    let mut cause = None;
    while let Some(joined) = set.join_next().await {
        if let Err(err) = flatten(joined) {
            if cause.is_none() {
                debug!(error = %err, "run_all stopped on first error");
                shared.cancel();
                cause = Some(err);
            }
        }
    }
    shared.cancel();
    cause.map_or(Ok(()), Err)
}

/// Runs all futures concurrently; returns on the first success, otherwise the last error.
pub async fn run_any<I, Fut>(futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    run_cancelable_any(Scope::new(), futs).await
}

/// [`run_any`] under a child of `scope`.
pub async fn run_cancelable_any<I, Fut>(scope: Scope, futs: I) -> Result<(), TaskError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let shared = scope.child();
    let mut set = spawn_all(&shared, futs);

    let mut ok = false;
    let mut cause = None;
    while let Some(joined) = set.join_next().await {
        match flatten(joined) {
            Ok(()) if !ok => {
                shared.cancel();
                ok = true;
            }
            Err(err) if !ok => cause = Some(err),
            _ => {}
        }
    }
    shared.cancel();
    if ok {
        return Ok(());
    }
    cause.map_or(Ok(()), Err)
}

fn spawn_all<I, Fut>(shared: &Scope, futs: I) -> JoinSet<Result<(), TaskError>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for fut in futs {
        let scope = shared.clone();
        set.spawn(async move { race(&scope, fut).await });
    }
    set
}

/// Spawns `fut` unless `scope` already ended, then waits for it or for the scope.
async fn race<Fut>(scope: &Scope, fut: Fut) -> Result<(), TaskError>
where
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    if let Some(err) = scope.err() {
        return Err(err);
    }
    let handle = tokio::spawn(AssertUnwindSafe(fut).catch_unwind());
    tokio::select! {
        biased;
        joined = handle => match joined {
            Ok(Ok(res)) => res,
            Ok(Err(panic)) => Err(TaskError::Panicked { info: panic_message(panic.as_ref()) }),
            Err(err) => Err(join_error(err)),
        },
        _ = scope.cancelled() => Err(scope.err().unwrap_or(TaskError::Canceled)),
    }
}

fn flatten(joined: Result<Result<(), TaskError>, JoinError>) -> Result<(), TaskError> {
    joined.unwrap_or_else(|err| Err(join_error(err)))
}

fn join_error(err: JoinError) -> TaskError {
    if err.is_panic() {
        TaskError::Panicked {
            info: panic_message(err.into_panic().as_ref()),
        }
    } else {
        TaskError::Canceled
    }
}
