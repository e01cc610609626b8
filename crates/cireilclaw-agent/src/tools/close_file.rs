//! Tool: `close-file` — unpin a file.

use async_trait::async_trait;

use super::{Tool, ToolContext, ToolResult};

pub struct CloseFileTool;

#[async_trait]
impl Tool for CloseFileTool {
    fn name(&self) -> &str {
        "close-file"
    }

    fn description(&self) -> &str {
        "Unpin a previously opened file."
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
            Some(p) => p.to_string(),
            None => return ToolResult::error("missing required parameter: path"),
        };

        let before = ctx.pinned_files.len();
        ctx.pinned_files.retain(|p| p != &path);
        let removed = ctx.pinned_files.len() < before;

        ToolResult::ok(serde_json::json!({ "pinned": ctx.pinned_files.clone(), "removed": removed }))
    }
}
