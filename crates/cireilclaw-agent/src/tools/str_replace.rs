//! Tool: `str-replace` — replace a unique substring in a file.

use async_trait::async_trait;
use cireilclaw_sandbox::resolver;

use super::{Tool, ToolContext, ToolResult};

const CONTEXT_RADIUS: usize = 80;

pub struct StrReplaceTool;

#[async_trait]
impl Tool for StrReplaceTool {
    fn name(&self) -> &str {
        "str-replace"
    }

    fn description(&self) -> &str {
        "Replace a unique occurrence of old_text with new_text in a file. Fails if old_text is missing or appears more than once."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "old_text": { "type": "string" },
                "new_text": { "type": "string" }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("missing required parameter: path"),
        };
        let old_text = match input.get("old_text").and_then(|v| v.as_str()) {
            Some(t) if !t.is_empty() => t,
            _ => return ToolResult::error("old_text must be a non-empty string"),
        };
        let new_text = input.get("new_text").and_then(|v| v.as_str()).unwrap_or("");

        let resolved = match resolver::resolve(&ctx.agent_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let content = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read '{path}': {e}")),
        };

        let occurrences = content.matches(old_text).count();
        if occurrences == 0 {
            return ToolResult::error(format!("old_text not found in '{path}'"));
        }
        if occurrences > 1 {
            return ToolResult::error(format!(
                "old_text appears {occurrences} times in '{path}'; must be unique"
            ));
        }

        let offset = content.find(old_text).expect("checked above");
        let updated = format!(
            "{}{}{}",
            &content[..offset],
            new_text,
            &content[offset + old_text.len()..]
        );

        if let Err(e) = std::fs::write(&resolved, &updated) {
            return ToolResult::error(format!("failed to write '{path}': {e}"));
        }

        let excerpt_start = offset.saturating_sub(CONTEXT_RADIUS);
        let excerpt_end = (offset + new_text.len() + CONTEXT_RADIUS).min(updated.len());
        let excerpt = safe_slice(&updated, excerpt_start, excerpt_end);

        ToolResult::ok(serde_json::json!({ "path": path, "excerpt": excerpt }))
    }
}

fn safe_slice(s: &str, start: usize, end: usize) -> String {
    let start = (start..=end).find(|&i| s.is_char_boundary(i)).unwrap_or(end);
    let end = (start..=s.len()).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(start);
    s[start..end].to_string()
}
