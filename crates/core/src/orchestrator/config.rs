//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of items per remote job.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between two status checks of the same job (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Wall-clock limit per job, counted from its submission (milliseconds).
    /// Jobs still running past this limit are cancelled remotely.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_ms: u64,

    /// Consecutive failed status checks before a warning is logged.
    #[serde(default = "default_warn_threshold")]
    pub status_failure_warn_threshold: u32,

    /// Capacity of the observer event channel.
    #[serde(default = "default_observer_buffer")]
    pub observer_buffer: usize,
}

fn default_batch_size() -> usize {
    3
}

fn default_poll_interval() -> u64 {
    2000 // 2 seconds
}

fn default_job_timeout() -> u64 {
    600_000 // 10 minutes
}

fn default_warn_threshold() -> u32 {
    3
}

fn default_observer_buffer() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval(),
            job_timeout_ms: default_job_timeout(),
            status_failure_warn_threshold: default_warn_threshold(),
            observer_buffer: default_observer_buffer(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    /// Check the values that would make orchestration impossible.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size cannot be 0".to_string());
        }
        if self.job_timeout_ms == 0 {
            return Err("job_timeout_ms cannot be 0".to_string());
        }
        if self.observer_buffer == 0 {
            return Err("observer_buffer cannot be 0".to_string());
        }
        Ok(())
    }
}
