use std::path::PathBuf;

use clap::Parser;

/// Generate narrated audio for a directory of markdown stories.
#[derive(Debug, Parser)]
#[command(name = "voxbatch", version)]
#[command(about = "Batch text-to-speech for markdown stories on a remote endpoint")]
pub(crate) struct Args {
    /// Config file (TOML). Without it, configuration comes from the environment only.
    #[arg(long, env = "VOXBATCH_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Directory containing the `.md` stories.
    #[arg(long, default_value = "stories")]
    pub(crate) stories_dir: PathBuf,

    /// Directory receiving chunk and merged audio.
    #[arg(long, default_value = "audio")]
    pub(crate) out_dir: PathBuf,

    /// Audio file used as voice-cloning prompt.
    #[arg(long)]
    pub(crate) audio_prompt: Option<PathBuf>,

    /// Transcript of the audio prompt.
    #[arg(long, requires = "audio_prompt")]
    pub(crate) transcript: Option<String>,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = 200)]
    pub(crate) chunk_chars: usize,

    /// Items per remote job (overrides the config).
    #[arg(long)]
    pub(crate) batch_size: Option<usize>,

    /// Keep chunks only: regenerate existing stories and skip merging.
    #[arg(long)]
    pub(crate) chunked: bool,

    /// Log as JSON lines.
    #[arg(long)]
    pub(crate) json: bool,

    /// Write Prometheus metrics of the run to this file.
    #[arg(long)]
    pub(crate) metrics_out: Option<PathBuf>,
}
