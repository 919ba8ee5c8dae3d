use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::info;

use crate::batch::AudioPrompt;

use super::AudioError;

/// Read an audio file and wrap it as a voice-cloning prompt.
pub async fn load_audio_prompt(
    path: &Path,
    transcript: Option<String>,
) -> Result<AudioPrompt, AudioError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(AudioError::NotFound(path.display().to_string()));
    }

    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(AudioError::InvalidWav(format!(
            "{} is empty",
            path.display()
        )));
    }

    info!(
        "Audio prompt: {} ({:.1} KB)",
        path.display(),
        bytes.len() as f64 / 1024.0
    );
    Ok(AudioPrompt::new(STANDARD.encode(&bytes), transcript))
}
