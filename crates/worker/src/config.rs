//! Worker loop timings.

use consumer_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timings for the consumption loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Pause between cycles
    #[serde(default = "default_consumption_interval_seconds")]
    pub consumption_interval_seconds: u64,
    /// How long each topic poll may wait for a message
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Pause after a failed cycle before polling again
    #[serde(default = "default_retry_backoff_seconds")]
    pub retry_backoff_seconds: u64,
}

fn default_consumption_interval_seconds() -> u64 {
    15
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

fn default_retry_backoff_seconds() -> u64 {
    30
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            consumption_interval_seconds: default_consumption_interval_seconds(),
            poll_timeout_ms: default_poll_timeout_ms(),
            retry_backoff_seconds: default_retry_backoff_seconds(),
        }
    }
}

impl WorkerSettings {
    pub fn consumption_interval(&self) -> Duration {
        Duration::from_secs(self.consumption_interval_seconds)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(Error::config("worker.poll_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}
