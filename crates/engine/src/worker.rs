use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::engine::WebhookEngine;

/// Configuration for a [`QueueWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between sweeps.
    pub poll_interval: Duration,
    /// Due deliveries picked up per sweep.
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Periodically sweeps the delivery queue until told to stop.
///
/// Any number of workers, in one process or many, may sweep the same store.
pub struct QueueWorker {
    engine: WebhookEngine,
    config: WorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

impl QueueWorker {
    pub fn new(engine: WebhookEngine, config: WorkerConfig, shutdown_rx: mpsc::Receiver<()>) -> Self {
        Self {
            engine,
            config,
            shutdown_rx,
        }
    }

    /// Run sweeps until a shutdown message arrives or every sender is dropped.
    pub async fn run(&mut self) {
        info!(
            poll_interval = ?self.config.poll_interval,
            batch_size = self.config.batch_size,
            "queue worker starting"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("queue worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match self.engine.process_queue(self.config.batch_size).await {
                        Ok(report) => debug!(
                            scanned = report.scanned,
                            claimed = report.claimed,
                            "sweep finished"
                        ),
                        Err(e) => error!(error = %e, "error sweeping delivery queue"),
                    }
                }
            }
        }

        info!("queue worker stopped");
    }
}
