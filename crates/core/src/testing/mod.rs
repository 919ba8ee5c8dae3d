//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable mock of the remote job service,
//! allowing orchestration tests without a real endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use voxbatch_core::testing::{fixtures, MockRemoteClient, MockStep};
//!
//! let client = Arc::new(MockRemoteClient::new());
//! client.script(0, vec![MockStep::queued(), MockStep::CompleteAll]).await;
//!
//! let orchestrator = BatchOrchestrator::new(fixtures::test_config(), client.clone());
//! let items = orchestrator
//!     .orchestrate(fixtures::work_items(&["a", "b"]), OrchestrateOptions::default())
//!     .await?;
//! ```

mod mock_remote_client;

pub use mock_remote_client::{MockRemoteClient, MockStep, RecordedSubmit};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::batch::{GenerationParams, JobInput, WorkItem};
    use crate::orchestrator::OrchestratorConfig;

    /// Audio bytes the mock returns for `text`.
    pub fn fake_audio(text: &str) -> Vec<u8> {
        format!("audio:{}", text).into_bytes()
    }

    /// A job payload with default parameters.
    pub fn job_input(texts: &[&str]) -> JobInput {
        JobInput {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            params: GenerationParams::default(),
            audio_prompt: None,
            audio_prompt_transcript: None,
        }
    }

    /// Orchestrator config with fast polling for tests.
    pub fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval_ms: 10,
            job_timeout_ms: 5_000,
            ..Default::default()
        }
    }

    /// Work items whose context is their input position.
    pub fn work_items(texts: &[&str]) -> Vec<WorkItem<usize>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| WorkItem::new(*text, format!("item {}", i), i))
            .collect()
    }

    /// A PCM WAV file with a canonical 44-byte header.
    pub fn wav_bytes(channels: u16, sample_rate: u32, bits_per_sample: u16, pcm: &[u8]) -> Vec<u8> {
        let block_align = channels.wrapping_mul(bits_per_sample / 8);
        let byte_rate = sample_rate.wrapping_mul(block_align as u32);

        let mut out = Vec::with_capacity(44 + pcm.len());
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits_per_sample.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        out.extend_from_slice(pcm);
        out
    }
}
