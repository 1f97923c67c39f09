//! Pending-work counter with an awaitable "drained" state.
//!
//! Every accepted unit of work calls [`DrainGate::enter`] once and [`DrainGate::leave`] once.
//! Both transitions go through one `watch` channel, so a waiter can never miss the
//! `1 → 0` edge or observe a stale `0` from before an `enter`.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct DrainGate {
    pending: watch::Sender<usize>,
}

impl Default for DrainGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DrainGate {
    pub(crate) fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self { pending }
    }

    pub(crate) fn enter(&self) {
        self.pending.send_modify(|n| *n += 1);
    }

    pub(crate) fn leave(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub(crate) fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once the counter is zero. Can be awaited repeatedly.
    pub(crate) async fn wait(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_gate_is_open() {
        let gate = DrainGate::new();
        gate.wait().await;
        gate.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_drained() {
        let gate = Arc::new(DrainGate::new());
        gate.enter();
        gate.enter();

        let g = Arc::clone(&gate);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            g.leave();
            tokio::time::sleep(Duration::from_millis(10)).await;
            g.leave();
        });

        let start = tokio::time::Instant::now();
        gate.wait().await;
        assert_eq!(gate.pending(), 0);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
