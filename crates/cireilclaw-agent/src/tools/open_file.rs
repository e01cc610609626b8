//! Tool: `open-file` — pin a file so its content is kept in context.

use async_trait::async_trait;
use cireilclaw_sandbox::resolver;

use super::{Tool, ToolContext, ToolResult};

pub struct OpenFileTool;

#[async_trait]
impl Tool for OpenFileTool {
    fn name(&self) -> &str {
        "open-file"
    }

    fn description(&self) -> &str {
        "Pin a file so its content is included in every future system prompt until closed."
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

        let resolved = match resolver::resolve(&ctx.agent_root, &path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        if !resolved.is_file() {
            return ToolResult::error(format!("'{path}' does not exist"));
        }

        if !ctx.pinned_files.contains(&path) {
            ctx.pinned_files.push(path);
        }

        ToolResult::ok(serde_json::json!({ "pinned": ctx.pinned_files.clone() }))
    }
}
