//! Audio files written under the output directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Layout: `{root}/{story}.wav` for merged stories and
/// `{root}/{story}/chunk_NN.{format}` for chunks.
#[derive(Debug, Clone)]
pub(crate) struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn merged_path(&self, story: &str) -> PathBuf {
        self.root.join(format!("{}.wav", story))
    }

    pub(crate) fn chunk_path(&self, story: &str, chunk: usize, format: &str) -> PathBuf {
        self.root
            .join(story)
            .join(format!("chunk_{:02}.{}", chunk, format))
    }

    pub(crate) async fn write_chunk(
        &self,
        story: &str,
        chunk: usize,
        format: &str,
        audio: &[u8],
    ) -> Result<PathBuf> {
        let path = self.chunk_path(story, chunk, format);
        write_file(&path, audio).await?;
        Ok(path)
    }

    pub(crate) async fn write_merged(&self, story: &str, audio: &[u8]) -> Result<PathBuf> {
        let path = self.merged_path(story);
        write_file(&path, audio).await?;
        Ok(path)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Size in KB for log lines.
pub(crate) fn size_kb(bytes: &[u8]) -> f64 {
    bytes.len() as f64 / 1024.0
}
