//! Periodic flush scheduler

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::writer::{BatchWriter, DrainTrigger};

/// Drains the batch writer on a fixed period
pub struct FlushScheduler {
    writer: Arc<BatchWriter>,
    period: Duration,
}

impl FlushScheduler {
    pub fn new(writer: Arc<BatchWriter>, period: Duration) -> Self {
        Self { writer, period }
    }

    /// Start the timer task
    pub fn spawn(self) -> FlushHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        FlushHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        // First tick one full period from now, not immediately.
        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = self.period.as_millis() as u64, "flush scheduler started");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let drained = self.writer.drain(DrainTrigger::Timer);
                    if drained > 0 {
                        debug!(points = drained, "timer drain");
                    }
                }
                _ = &mut shutdown => {
                    let written = self.writer.close().await;
                    info!(points = written, "flush scheduler stopped");
                    break;
                }
            }
        }
    }
}

/// Handle to a running [`FlushScheduler`]
pub struct FlushHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl FlushHandle {
    /// Stop the timer, write out whatever is still buffered and wait for
    /// writes that were already running
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}
