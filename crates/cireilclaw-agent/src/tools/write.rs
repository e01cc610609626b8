//! Tool: `write` — create or overwrite a file.

use async_trait::async_trait;
use cireilclaw_sandbox::resolver;

use super::{Tool, ToolContext, ToolResult};

pub struct WriteTool;

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Files under /blocks must have a .md extension."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("missing required parameter: path"),
        };
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("missing required parameter: content"),
        };

        if path.trim_start_matches('/').starts_with("blocks/")
            && !path.to_ascii_lowercase().ends_with(".md")
        {
            return ToolResult::error("files under /blocks must have a .md extension");
        }

        let resolved = match resolver::resolve(&ctx.agent_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ToolResult::error(format!("failed to create directories for '{path}': {e}"));
            }
        }

        match std::fs::write(&resolved, content) {
            Ok(()) => ToolResult::ok(serde_json::json!({ "path": path, "size": content.len() })),
            Err(e) => ToolResult::error(format!("failed to write '{path}': {e}")),
        }
    }
}
