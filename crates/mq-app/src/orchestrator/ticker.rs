use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

/// Periodic poll trigger for one job epoch.
///
/// The period restarts once the consumer comes back for the next tick, so a slow
/// handler delays the following tick instead of letting ticks bunch up. Dropping
/// the ticker aborts the task; [`PollTicker::stop`] does the same explicitly.
pub struct PollTicker {
    rx: mpsc::Receiver<u64>,
    handled: Arc<Notify>,
    delivered: bool,
    handle: JoinHandle<()>,
}

impl PollTicker {
    pub fn start(period: Duration, epoch: u64) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let handled = Arc::new(Notify::new());
        let ack = handled.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if tx.send(epoch).await.is_err() {
                    break;
                }
                ack.notified().await;
            }
        });

        Self {
            rx,
            handled,
            delivered: false,
            handle,
        }
    }

    /// Waits for the next tick, one full period after the previous one was
    /// handed out and the caller returned. `None` once the task has gone away.
    pub async fn tick(&mut self) -> Option<u64> {
        if self.delivered {
            self.handled.notify_one();
        }
        let epoch = self.rx.recv().await;
        self.delivered = epoch.is_some();
        epoch
    }

    pub fn stop(self) {
        // Drop does the teardown.
    }
}

impl Drop for PollTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
