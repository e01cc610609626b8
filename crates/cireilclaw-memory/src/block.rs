//! `MemoryBlock` loading (`<memory_blocks>`).
//!
//! Each block lives at `/blocks/{label}.md`; the file's leading `+++`-fenced
//! TOML section carries its description, the body is the block content
//! injected verbatim into the system prompt.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{MemoryError, Result};
use crate::frontmatter;

#[derive(Debug, Deserialize)]
struct BlockFrontmatter {
    description: String,
}

#[derive(Debug, Clone)]
pub struct MemoryBlock {
    pub label: String,
    pub description: String,
    pub file_path: String,
    pub content_chars_current: usize,
    pub content: String,
}

/// Loads every `*.md` file directly under `blocks_dir` as a `MemoryBlock`.
/// Files that fail to parse are logged and skipped rather than aborting the
/// whole load — one malformed block shouldn't take down the others.
pub fn load_all(blocks_dir: &Path) -> Vec<MemoryBlock> {
    let mut blocks = Vec::new();
    let Ok(entries) = std::fs::read_dir(blocks_dir) else {
        return blocks;
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();

    for path in paths {
        match load_one(&path) {
            Ok(block) => blocks.push(block),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to load memory block"),
        }
    }
    blocks
}

fn load_one(path: &Path) -> Result<MemoryBlock> {
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let path_str = path.display().to_string();

    let raw = std::fs::read_to_string(path).map_err(|source| MemoryError::Read {
        path: path_str.clone(),
        source,
    })?;

    let (frontmatter, content): (BlockFrontmatter, String) = frontmatter::parse(&path_str, &raw)?;

    Ok(MemoryBlock {
        label,
        description: frontmatter.description,
        file_path: path_str,
        content_chars_current: content.chars().count(),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_single_block() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("preferences.md"),
            "+++\ndescription = \"User preferences\"\n+++\nUser likes dark mode.\n",
        )
        .unwrap();

        let blocks = load_all(dir.path());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label, "preferences");
        assert_eq!(blocks[0].description, "User preferences");
        assert!(blocks[0].content.contains("dark mode"));
        assert_eq!(blocks[0].content_chars_current, blocks[0].content.chars().count());
    }

    #[test]
    fn skips_malformed_block_without_failing_others() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.md"), "no frontmatter").unwrap();
        std::fs::write(
            dir.path().join("good.md"),
            "+++\ndescription = \"ok\"\n+++\nfine\n",
        )
        .unwrap();

        let blocks = load_all(dir.path());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].label, "good");
    }

    #[test]
    fn missing_directory_returns_empty() {
        let blocks = load_all(Path::new("/nonexistent/blocks/dir"));
        assert!(blocks.is_empty());
    }
}
