pub mod audio;
pub mod batch;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod remote;
pub mod testing;

pub use audio::{concatenate_wav, load_audio_prompt, wav_duration_secs, AudioError};
pub use batch::{
    build_batches, compatibility_key, AudioPrompt, Batch, GenerationOverrides, GenerationParams,
    JobInput, WorkItem,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    EndpointConfig, SanitizedConfig,
};
pub use orchestrator::{
    observer_channel, BatchOrchestrator, ItemEvent, ItemStatus, JobError, ObserverHandle,
    OrchestrateOptions, OrchestratorConfig, OrchestratorError, TrackedItem,
};
pub use remote::{JobOutput, JobStatus, RemoteError, RemoteJobClient, RemoteState, RunpodClient};
