//! # Completion signals.
//!
//! - [`Done`] resolves once a unit of work has finished.
//! - [`ResultFuture`] resolves to the [`TaskResult`] of a task.
//!
//! Both are backed by a `oneshot` channel. If the producing side is dropped without
//! completing (a pool discarded the job on shutdown, the job panicked), `Done` still resolves
//! and `ResultFuture` resolves to a canceled result, so no waiter hangs forever.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context as PollContext, Poll};

use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::tasks::TaskResult;

/// Producer half of [`Done`]. Closing or dropping it resolves the paired future.
#[derive(Debug)]
pub struct DoneSignal {
    tx: oneshot::Sender<()>,
}

impl DoneSignal {
    /// Marks the work as finished.
    pub fn close(self) {
        let _ = self.tx.send(());
    }
}

/// Future that resolves once the associated unit of work has finished.
#[derive(Debug)]
#[must_use = "a Done does nothing unless awaited"]
pub struct Done {
    rx: Option<oneshot::Receiver<()>>,
}

impl Done {
    /// Creates a linked signal/future pair.
    pub fn channel() -> (DoneSignal, Done) {
        let (tx, rx) = oneshot::channel();
        (DoneSignal { tx }, Done { rx: Some(rx) })
    }

    /// A `Done` that is already resolved.
    pub fn ready() -> Done {
        Done { rx: None }
    }

    /// Non-blocking check.
    pub fn is_done(&mut self) -> bool {
        match self.rx.as_mut() {
            None => true,
            Some(rx) => match rx.try_recv() {
                Err(oneshot::error::TryRecvError::Empty) => false,
                _ => {
                    self.rx = None;
                    true
                }
            },
        }
    }
}

impl Future for Done {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut PollContext<'_>) -> Poll<()> {
        match self.rx.as_mut() {
            None => Poll::Ready(()),
            Some(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(_) => {
                    self.rx = None;
                    Poll::Ready(())
                }
            },
        }
    }
}

/// Future resolving to a task's [`TaskResult`].
#[derive(Debug)]
#[must_use = "a ResultFuture does nothing unless awaited"]
pub struct ResultFuture {
    rx: oneshot::Receiver<TaskResult>,
}

impl ResultFuture {
    pub(crate) fn channel() -> (oneshot::Sender<TaskResult>, ResultFuture) {
        let (tx, rx) = oneshot::channel();
        (tx, ResultFuture { rx })
    }
}

impl Future for ResultFuture {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut PollContext<'_>) -> Poll<TaskResult> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(TaskResult::interrupted(TaskError::Canceled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_signal_resolves() {
        let (signal, mut done) = Done::channel();
        assert!(!done.is_done());
        drop(signal);
        assert!(done.is_done());
        done.await;
    }

    #[tokio::test]
    async fn dropped_sender_yields_canceled_result() {
        let (tx, fut) = ResultFuture::channel();
        drop(tx);
        let result = fut.await;
        assert!(result.canceled());
        assert_eq!(result.error(), Some(&TaskError::Canceled));
    }
}
