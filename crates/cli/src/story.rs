//! Markdown stories and their speech chunks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Headings that end the narrated part of a story.
const STOP_HEADING: &str = r"(?i)^##\s+(vocabulaire|vocabulary|grammar|reflection)";

/// Speaker tag expected by the model.
const SPEAKER_TAG: &str = "[S1] ";

/// Caller context attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkContext {
    pub(crate) story: String,
    pub(crate) chunk: usize,
}

/// A story split into speech chunks.
#[derive(Debug, Clone)]
pub(crate) struct Story {
    pub(crate) name: String,
    pub(crate) chunks: Vec<String>,
}

/// Narrated paragraphs of a markdown story.
///
/// Front matter and headings are skipped. Reading stops at a vocabulary,
/// grammar or reflection section, or at a `---` rule once text was found.
pub(crate) fn extract_paragraphs(markdown: &str) -> Vec<String> {
    let stop = regex_lite::Regex::new(STOP_HEADING).ok();
    let mut paragraphs = Vec::new();
    let mut in_front_matter = false;
    let mut past_front_matter = false;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if trimmed == "---" {
            if !past_front_matter && paragraphs.is_empty() {
                in_front_matter = !in_front_matter;
                if !in_front_matter {
                    past_front_matter = true;
                }
                continue;
            }
            if !paragraphs.is_empty() {
                break;
            }
            continue;
        }
        if in_front_matter {
            continue;
        }
        if stop.as_ref().is_some_and(|re| re.is_match(trimmed)) {
            break;
        }
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }
        paragraphs.push(trimmed.to_string());
    }

    paragraphs
}

/// Greedily join paragraphs into chunks of at most `limit` characters.
///
/// A paragraph longer than the limit becomes a chunk of its own. Every
/// chunk carries the speaker tag.
pub(crate) fn chunk_paragraphs(paragraphs: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if current_len + len > limit && !current.is_empty() {
            chunks.push(format!("{}{}", SPEAKER_TAG, current.join(" ")));
            current.clear();
            current_len = 0;
        }
        current.push(paragraph);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(format!("{}{}", SPEAKER_TAG, current.join(" ")));
    }

    chunks
}

/// Markdown files of `dir`, sorted by name.
pub(crate) fn discover_stories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read stories directory {:?}", dir))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read and chunk one story file.
pub(crate) fn load_story(path: &Path, limit: usize) -> Result<Story> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .with_context(|| format!("Story path {:?} has no file name", path))?;
    let markdown = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read story {:?}", path))?;

    Ok(Story {
        name,
        chunks: chunk_paragraphs(&extract_paragraphs(&markdown), limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: &str = "---
title: De kat
level: A1
---

# De kat

De kat zit op de mat.

Hij is moe.

## Vocabulaire

- de kat: the cat
";

    #[test]
    fn test_extract_skips_front_matter_and_headings() {
        let paragraphs = extract_paragraphs(STORY);
        assert_eq!(paragraphs, vec!["De kat zit op de mat.", "Hij is moe."]);
    }

    #[test]
    fn test_extract_stops_at_rule_after_content() {
        let markdown = "First line.\n\n---\n\nNotes for the reader.";
        assert_eq!(extract_paragraphs(markdown), vec!["First line."]);
    }

    #[test]
    fn test_extract_stop_heading_is_case_insensitive() {
        let markdown = "Once upon a time.\n## GRAMMAR\nPresent tense.";
        assert_eq!(extract_paragraphs(markdown), vec!["Once upon a time."]);
    }

    #[test]
    fn test_extract_without_front_matter() {
        let markdown = "# Title\nOne.\nTwo.";
        assert_eq!(extract_paragraphs(markdown), vec!["One.", "Two."]);
    }

    #[test]
    fn test_chunk_respects_limit() {
        let paragraphs: Vec<String> = vec!["aaaa".into(), "bbbb".into(), "cccc".into()];
        let chunks = chunk_paragraphs(&paragraphs, 8);
        assert_eq!(chunks, vec!["[S1] aaaa bbbb", "[S1] cccc"]);
    }

    #[test]
    fn test_chunk_long_paragraph_stands_alone() {
        let paragraphs: Vec<String> = vec!["short".into(), "x".repeat(50), "tail".into()];
        let chunks = chunk_paragraphs(&paragraphs, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], format!("[S1] {}", "x".repeat(50)));
    }

    #[test]
    fn test_chunk_empty() {
        assert!(chunk_paragraphs(&[], 200).is_empty());
    }

    #[test]
    fn test_discover_and_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), STORY).unwrap();
        std::fs::write(dir.path().join("a.md"), "Hallo.").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = discover_stories(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);

        let story = load_story(&files[1], 200).unwrap();
        assert_eq!(story.name, "b");
        assert_eq!(story.chunks, vec!["[S1] De kat zit op de mat. Hij is moe."]);
    }
}
