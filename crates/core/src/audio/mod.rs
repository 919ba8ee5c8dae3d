//! Audio helpers: prompt loading and WAV handling.

mod prompt;
mod wav;

pub use prompt::load_audio_prompt;
pub use wav::{concatenate_wav, wav_duration_secs, WavFormat, WAV_HEADER_LEN};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    #[error("No audio buffers to concatenate")]
    Empty,
}
