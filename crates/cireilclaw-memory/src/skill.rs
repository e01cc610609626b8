//! `Skill` loading (`<skills>` index, `read-skill` tool).
//!
//! Each skill lives at `/skills/{slug}.md`; its `+++`-fenced TOML frontmatter
//! is validated against a strict schema (`deny_unknown_fields`) so a typo in
//! a skill file fails loudly instead of silently dropping a field.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{MemoryError, Result};
use crate::frontmatter;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SkillFrontmatter {
    summary: String,
    when_to_use: String,
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub slug: String,
    pub summary: String,
    pub when_to_use: String,
}

/// Loads every `*.md` file directly under `skills_dir` as a `Skill`, for the
/// `<skills>` index. Malformed files are logged and skipped.
pub fn load_all(skills_dir: &Path) -> Vec<Skill> {
    let mut skills = Vec::new();
    let Ok(entries) = std::fs::read_dir(skills_dir) else {
        return skills;
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();

    for path in paths {
        match load_one(&path) {
            Ok(skill) => skills.push(skill),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to load skill"),
        }
    }
    skills
}

fn load_one(path: &Path) -> Result<Skill> {
    let slug = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let path_str = path.display().to_string();

    let raw = std::fs::read_to_string(path).map_err(|source| MemoryError::Read {
        path: path_str.clone(),
        source,
    })?;

    let (frontmatter, _body): (SkillFrontmatter, String) = frontmatter::parse(&path_str, &raw)?;

    Ok(Skill {
        slug,
        summary: frontmatter.summary,
        when_to_use: frontmatter.when_to_use,
    })
}

/// Reads the full content of `/skills/{slug}.md` for the `read-skill` tool,
/// returning the raw file bytes (frontmatter included) as that is what the
/// tool contract describes: "returns the contents of `/skills/{slug}.md`".
pub fn read_raw(skills_dir: &Path, slug: &str) -> Result<String> {
    let path = skills_dir.join(format!("{slug}.md"));
    std::fs::read_to_string(&path).map_err(|source| MemoryError::Read {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_single_skill() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("weather.md"),
            "+++\nsummary = \"Look up weather\"\nwhen_to_use = \"User asks about weather\"\n+++\nBody.\n",
        )
        .unwrap();

        let skills = load_all(dir.path());
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].slug, "weather");
        assert_eq!(skills[0].summary, "Look up weather");
    }

    #[test]
    fn unknown_frontmatter_field_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.md"),
            "+++\nsummary = \"x\"\nwhen_to_use = \"y\"\nextra_field = \"z\"\n+++\nBody.\n",
        )
        .unwrap();

        let skills = load_all(dir.path());
        assert!(skills.is_empty());
    }

    #[test]
    fn read_raw_returns_full_file() {
        let dir = tempdir().unwrap();
        let content = "+++\nsummary = \"s\"\nwhen_to_use = \"w\"\n+++\nBody text.\n";
        std::fs::write(dir.path().join("weather.md"), content).unwrap();

        let raw = read_raw(dir.path(), "weather").unwrap();
        assert_eq!(raw, content);
    }
}
