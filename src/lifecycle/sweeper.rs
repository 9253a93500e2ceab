//! Periodic reconciliation task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::controller::AccessController;

/// Handle to a running sweep loop.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping every `every`. The first sweep runs immediately.
    #[must_use]
    pub fn spawn(controller: AccessController, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?every, "Sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = controller.sweep().await {
                            warn!(operation = "sweep", "Sweep failed: {e}");
                        }
                    },
                    _ = shutdown_rx.recv() => {
                        debug!("Sweeper shutting down");
                        break;
                    },
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the loop and wait for an in-flight sweep to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            warn!("Sweeper task ended abnormally: {e}");
        }
    }
}
