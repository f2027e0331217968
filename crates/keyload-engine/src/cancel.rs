use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Process-wide, cooperative cancellation flag shared by every worker.
///
/// Workers observe it at each sleep point and at the top-of-loop deadline
/// check; a worker blocked inside a store call finishes that call first.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed, `false` on cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }

        let mut rx = self.tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_cancelled(),
            _ = Self::cancelled(&mut rx) => false,
        }
    }

    async fn cancelled(rx: &mut watch::Receiver<bool>) {
        loop {
            let cancelled = *rx.borrow_and_update();
            if cancelled {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone; nothing can cancel us anymore.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}
