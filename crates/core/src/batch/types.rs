//! Types for work items, generation parameters and batches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Parameters that control speech generation (everything except the text
/// and the voice-cloning prompt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Token budget for a single generation.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    /// Classifier-free guidance scale.
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    /// Sampling temperature (0.0 = greedy).
    #[serde(default)]
    pub temperature: f32,
    /// Nucleus sampling threshold.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Top-k sampling cutoff.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Audio container requested from the remote worker (e.g. "wav").
    #[serde(default = "default_output_format")]
    pub output_format: String,
    /// Fixed seed for reproducible output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_max_new_tokens() -> u32 {
    3072
}

fn default_guidance_scale() -> f32 {
    3.0
}

fn default_top_p() -> f32 {
    0.8
}

fn default_top_k() -> u32 {
    30
}

fn default_output_format() -> String {
    "wav".to_string()
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            guidance_scale: default_guidance_scale(),
            temperature: 0.0,
            top_p: default_top_p(),
            top_k: default_top_k(),
            output_format: default_output_format(),
            seed: None,
        }
    }
}

/// Per-item parameter overrides, merged on top of the caller's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerationOverrides {
    /// Returns `base` with every overridden field replaced.
    pub fn apply(&self, base: &GenerationParams) -> GenerationParams {
        GenerationParams {
            max_new_tokens: self.max_new_tokens.unwrap_or(base.max_new_tokens),
            guidance_scale: self.guidance_scale.unwrap_or(base.guidance_scale),
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            top_k: self.top_k.unwrap_or(base.top_k),
            output_format: self
                .output_format
                .clone()
                .unwrap_or_else(|| base.output_format.clone()),
            seed: self.seed.or(base.seed),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }
}

/// Voice-cloning prompt shared by one or more items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPrompt {
    /// Base64-encoded prompt audio.
    pub base64: String,
    /// Transcript of the prompt audio.
    pub transcript: Option<String>,
}

impl AudioPrompt {
    pub fn new(base64: impl Into<String>, transcript: Option<String>) -> Self {
        Self {
            base64: base64.into(),
            transcript,
        }
    }

    /// Content fingerprint used for batch compatibility (hex SHA-256).
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.base64.as_bytes());
        hasher.update([0u8]);
        if let Some(ref transcript) = self.transcript {
            hasher.update([1u8]);
            hasher.update(transcript.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// One caller-supplied unit of work.
///
/// `context` is opaque to the orchestrator and is handed back on every
/// tracked snapshot of this item.
#[derive(Debug, Clone)]
pub struct WorkItem<T> {
    /// Text to synthesize.
    pub text: String,
    /// Human-readable label.
    pub label: String,
    /// Parameter overrides on top of the call defaults.
    pub overrides: GenerationOverrides,
    /// Optional voice-cloning prompt.
    pub audio_prompt: Option<Arc<AudioPrompt>>,
    /// Caller context.
    pub context: T,
}

impl<T> WorkItem<T> {
    pub fn new(text: impl Into<String>, label: impl Into<String>, context: T) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            overrides: GenerationOverrides::default(),
            audio_prompt: None,
            context,
        }
    }

    pub fn with_overrides(mut self, overrides: GenerationOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_audio_prompt(mut self, prompt: Arc<AudioPrompt>) -> Self {
        self.audio_prompt = Some(prompt);
        self
    }

    /// Effective parameters of this item under the given defaults.
    pub fn effective_params(&self, defaults: &GenerationParams) -> GenerationParams {
        self.overrides.apply(defaults)
    }
}

/// Input payload of one remote job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInput {
    /// One text per item, in batch order.
    pub texts: Vec<String>,
    #[serde(flatten)]
    pub params: GenerationParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_prompt_transcript: Option<String>,
}

/// A group of batch-compatible items submitted as one remote job.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position of this batch in builder order.
    pub index: usize,
    /// Positions of the member items in the caller's input, in input order.
    pub item_indices: Vec<usize>,
    /// Merged parameters shared by every member.
    pub params: GenerationParams,
    /// Job payload sent on submission.
    pub input: JobInput,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.item_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 3072);
        assert_eq!(params.guidance_scale, 3.0);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.top_p, 0.8);
        assert_eq!(params.top_k, 30);
        assert_eq!(params.output_format, "wav");
        assert!(params.seed.is_none());
    }

    #[test]
    fn test_overrides_apply_only_set_fields() {
        let base = GenerationParams::default();
        let overrides = GenerationOverrides::default()
            .with_seed(30)
            .with_temperature(1.5);

        let merged = overrides.apply(&base);
        assert_eq!(merged.seed, Some(30));
        assert_eq!(merged.temperature, 1.5);
        assert_eq!(merged.top_k, base.top_k);
        assert_eq!(merged.output_format, base.output_format);
    }

    #[test]
    fn test_overrides_keep_base_seed() {
        let base = GenerationParams {
            seed: Some(7),
            ..Default::default()
        };
        let merged = GenerationOverrides::default().apply(&base);
        assert_eq!(merged.seed, Some(7));
    }

    #[test]
    fn test_fingerprint_depends_on_transcript() {
        let a = AudioPrompt::new("AAAA", None);
        let b = AudioPrompt::new("AAAA", Some("hello".to_string()));
        let c = AudioPrompt::new("AAAA", Some("hello".to_string()));

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_job_input_wire_format() {
        let input = JobInput {
            texts: vec!["[S1] hello".to_string()],
            params: GenerationParams::default(),
            audio_prompt: None,
            audio_prompt_transcript: None,
        };

        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["texts"][0], "[S1] hello");
        assert_eq!(json["max_new_tokens"], 3072);
        assert_eq!(json["output_format"], "wav");
        assert!(json.get("seed").is_none());
        assert!(json.get("audio_prompt").is_none());
    }

    #[test]
    fn test_params_deserialize_partial() {
        let params: GenerationParams = toml::from_str("temperature = 1.5\nseed = 30").unwrap();
        assert_eq!(params.temperature, 1.5);
        assert_eq!(params.seed, Some(30));
        assert_eq!(params.max_new_tokens, 3072);
    }
}
