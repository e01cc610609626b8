//! System prompt assembly: `<base_instructions>` plus `<metadata>`,
//! `<memory_blocks>`, an optional `<skills>` index, and an optional
//! `<opened_files>` block. This provider protocol has no cache-control
//! blocks to target and a fixed, single-file `core.md` rather than a
//! multi-file workspace fallback chain, so the result is one flat string
//! assembled fresh per call.

use std::path::Path;

use chrono::Utc;
use cireilclaw_core::Channel;

/// Per-file cap applied to pinned file content injected into
/// `<opened_files>`.
const MAX_OPENED_FILE_CHARS: usize = 20_000;

pub struct PromptContext<'a> {
    pub agent_root: &'a Path,
    pub channel: &'a Channel,
    pub pinned_files: &'a [String],
}

/// Builds the full system prompt for one provider call.
pub fn assemble(ctx: &PromptContext<'_>) -> String {
    let mut sections = vec![base_instructions(ctx.agent_root), metadata_block(ctx.channel), memory_blocks_block(ctx.agent_root)];

    if let Some(skills) = skills_block(ctx.agent_root) {
        sections.push(skills);
    }
    if let Some(opened) = opened_files_block(ctx.agent_root, ctx.pinned_files) {
        sections.push(opened);
    }

    sections.join("\n\n")
}

fn base_instructions(agent_root: &Path) -> String {
    let content = std::fs::read_to_string(agent_root.join("core.md")).unwrap_or_default();
    format!("<base_instructions>\n{content}\n</base_instructions>")
}

fn metadata_block(channel: &Channel) -> String {
    let timestamp = Utc::now().to_rfc3339();
    let (kind, fields) = match channel {
        Channel::Discord { channel_id, guild_id, is_nsfw } => (
            "discord",
            format!(
                "channelId: {channel_id}\nguildId: {}\nisNsfw: {is_nsfw}",
                guild_id.as_deref().unwrap_or("none")
            ),
        ),
        Channel::Matrix { room_id } => ("matrix", format!("roomId: {room_id}")),
        Channel::Internal { job_id } => ("internal", format!("jobId: {job_id}")),
    };
    format!("<metadata>\ntimestamp: {timestamp}\nchannel: {kind}\n{fields}\n</metadata>")
}

fn memory_blocks_block(agent_root: &Path) -> String {
    let blocks = cireilclaw_memory::block::load_all(&agent_root.join("blocks"));
    let mut body = String::new();
    for block in &blocks {
        body.push_str(&format!(
            "<block label=\"{}\" description=\"{}\">\n{}\n</block>\n",
            block.label, block.description, block.content
        ));
    }
    format!("<memory_blocks>\n{body}</memory_blocks>")
}

fn skills_block(agent_root: &Path) -> Option<String> {
    let skills = cireilclaw_memory::skill::load_all(&agent_root.join("skills"));
    if skills.is_empty() {
        return None;
    }
    let mut body = String::new();
    for skill in &skills {
        body.push_str(&format!(
            "- {} — {} (use when: {})\n",
            skill.slug, skill.summary, skill.when_to_use
        ));
    }
    Some(format!("<skills>\n{body}</skills>"))
}

fn opened_files_block(agent_root: &Path, pinned_files: &[String]) -> Option<String> {
    if pinned_files.is_empty() {
        return None;
    }
    let mut body = String::new();
    for path in pinned_files {
        let resolved = match cireilclaw_sandbox::resolver::resolve(agent_root, path) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let Ok(content) = std::fs::read_to_string(&resolved) else {
            continue;
        };
        let size = content.len();
        let truncated = truncate_content(&content, MAX_OPENED_FILE_CHARS);
        body.push_str(&format!("<file path=\"{path}\" size=\"{size}\">\n{truncated}\n</file>\n"));
    }
    Some(format!("<opened_files>\n{body}</opened_files>"))
}

/// Truncate content to `max_chars` using a 70% head / 20% tail split with a
/// marker in between, breaking on line boundaries where possible.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }

    let head_chars = max_chars * 70 / 100;
    let tail_chars = max_chars * 20 / 100;
    let marker = "\n\n[... content truncated ...]\n\n";

    let head_end = content[..head_chars].rfind('\n').map(|i| i + 1).unwrap_or(head_chars);
    let tail_start = if content.len() > tail_chars {
        content[(content.len() - tail_chars)..]
            .find('\n')
            .map(|i| content.len() - tail_chars + i + 1)
            .unwrap_or(content.len() - tail_chars)
    } else {
        0
    };

    let mut out = String::with_capacity(head_end + marker.len() + (content.len() - tail_start));
    out.push_str(&content[..head_end]);
    out.push_str(marker);
    out.push_str(&content[tail_start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_preserves_small_content() {
        let content = "Hello, world!\nSecond line.";
        assert_eq!(truncate_content(content, MAX_OPENED_FILE_CHARS), content);
    }

    #[test]
    fn truncate_marks_large_content() {
        let content = (0..200).map(|i| format!("Line {i}\n")).collect::<String>();
        let result = truncate_content(&content, 200);
        assert!(result.contains("[... content truncated ...]"));
        assert!(result.len() < content.len());
    }

    #[test]
    fn metadata_includes_channel_kind() {
        let channel = Channel::Discord { channel_id: "1".into(), guild_id: None, is_nsfw: false };
        let block = metadata_block(&channel);
        assert!(block.contains("channel: discord"));
        assert!(block.contains("channelId: 1"));
    }
}
