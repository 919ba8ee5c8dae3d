//! Batch orchestrator for remote speech jobs.
//!
//! The orchestrator drives every work item to a terminal status:
//! - **Submission**: Sequential, in batch order, checked against cancellation
//! - **Polling**: Concurrent, one task per submitted job
//! - **Mapping**: Job results are split back onto the items of each batch

mod config;
mod observer;
mod poller;
mod runner;
mod tracker;
mod types;

pub use config::OrchestratorConfig;
pub use observer::{observer_channel, ItemEvent, ObserverHandle};
pub use poller::JobPoller;
pub use runner::{BatchOrchestrator, OrchestrateOptions};
pub use tracker::ItemTracker;
pub use types::{ItemStatus, JobError, JobOutcome, OrchestratorError, RemoteJob, TrackedItem};
