//! Tool: `list-dir` — list immediate children of a directory.

use async_trait::async_trait;
use cireilclaw_sandbox::resolver;

use super::{Tool, ToolContext, ToolResult};

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list-dir"
    }

    fn description(&self) -> &str {
        "List the immediate children of a directory."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("missing required parameter: path"),
        };

        let resolved = match resolver::resolve(&ctx.agent_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let read_dir = match std::fs::read_dir(&resolved) {
            Ok(rd) => rd,
            Err(e) => return ToolResult::error(format!("failed to list '{path}': {e}")),
        };

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let file_type = match entry.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };
            let kind = if file_type.is_symlink() {
                "symlink"
            } else if file_type.is_dir() {
                "directory"
            } else {
                "file"
            };
            entries.push(serde_json::json!({
                "name": entry.file_name().to_string_lossy(),
                "type": kind,
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        ToolResult::ok(serde_json::json!({ "entries": entries }))
    }
}
