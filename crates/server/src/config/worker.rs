use std::time::Duration;

use hookwire_engine::WorkerConfig;
use serde::Deserialize;

use crate::error::ServerError;

/// Configuration for the in-process sweep loops started by `run`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkerSection {
    /// Number of concurrent sweep loops. Defaults to 1.
    pub workers: Option<usize>,
    /// Seconds between sweeps of each loop. Defaults to 5.
    pub poll_interval_seconds: Option<u64>,
    /// Due deliveries per sweep. Defaults to the engine batch size.
    pub batch_size: Option<usize>,
}

impl WorkerSection {
    /// Number of sweep loops to run.
    pub fn worker_count(&self) -> Result<usize, ServerError> {
        match self.workers {
            Some(0) => Err(ServerError::Config(
                "worker.workers must be at least 1".into(),
            )),
            Some(n) => Ok(n),
            None => Ok(1),
        }
    }

    /// Build the per-loop configuration, falling back to `default_batch`.
    pub fn to_worker_config(&self, default_batch: usize) -> Result<WorkerConfig, ServerError> {
        let mut config = WorkerConfig::default().with_batch_size(default_batch);
        if let Some(secs) = self.poll_interval_seconds {
            if secs == 0 {
                return Err(ServerError::Config(
                    "worker.poll_interval_seconds must be at least 1".into(),
                ));
            }
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(batch) = self.batch_size {
            if batch == 0 {
                return Err(ServerError::Config(
                    "worker.batch_size must be at least 1".into(),
                ));
            }
            config.batch_size = batch;
        }
        Ok(config)
    }
}
