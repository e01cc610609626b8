//! `cireilclaw init` (CLI surface): an interactive wizard that lays down
//! a new agent's on-disk directory structure under `{root}/agents/{slug}`.

use std::io::Write;
use std::path::Path;

use cireilclaw_core::config::EngineConfig;

use crate::error::Result;

pub fn run(root: &Path) -> Result<()> {
    let slug = prompt("Agent slug", "main");
    let agent_root = root.join("agents").join(&slug);

    if agent_root.is_dir() {
        println!("{} already exists, leaving it untouched.", agent_root.display());
        return Ok(());
    }

    let api_base = prompt("Provider API base URL", "https://api.openai.com/v1");
    let api_key = prompt("Provider API key (blank to set later via env)", "");
    let model = prompt("Default model", "gpt-4o");

    for dir in ["blocks", "skills", "workspace", "memories", "images", "config/channels"] {
        std::fs::create_dir_all(agent_root.join(dir))?;
    }

    write_if_absent(
        &agent_root.join("core.md"),
        "# Core\n\nYou are a helpful agent. Edit this file to define your personality and goals.\n",
    )?;

    let engine = EngineConfig {
        api_base,
        api_key: if api_key.is_empty() { None } else { Some(api_key) },
        model,
        channel_overrides: Default::default(),
    };
    write_if_absent(
        &agent_root.join("config").join("engine.toml"),
        &toml::to_string_pretty(&engine)
            .map_err(|e| cireilclaw_core::ConfigError::Invalid(e.to_string()))?,
    )?;

    println!("Initialized agent '{}' at {}", slug, agent_root.display());
    println!("Edit {}/config/engine.toml and core.md, then run `cireilclaw run`.", agent_root.display());
    Ok(())
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_if_absent_creates_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("core.md");
        write_if_absent(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn write_if_absent_never_overwrites_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("core.md");
        std::fs::write(&path, "user edited this").unwrap();
        write_if_absent(&path, "default content").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "user edited this");
    }
}

fn prompt(label: &str, default: &str) -> String {
    if default.is_empty() {
        print!("{label}: ");
    } else {
        print!("{label} [{default}]: ");
    }
    let _ = std::io::stdout().flush();

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return default.to_string();
    }
    let trimmed = input.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}
