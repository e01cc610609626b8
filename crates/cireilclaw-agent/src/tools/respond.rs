//! Tool: `respond` — deliver content to the session.

use async_trait::async_trait;

use super::{Tool, ToolContext, ToolResult};

pub struct RespondTool;

#[async_trait]
impl Tool for RespondTool {
    fn name(&self) -> &str {
        "respond"
    }

    fn description(&self) -> &str {
        "Send a message back to the user. Set final=false to keep the turn going after sending."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Message text to send." },
                "final": { "type": "boolean", "description": "Whether this ends the turn (default true)." },
                "attachments": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional attachment paths."
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let content = match input.get("content").and_then(|v| v.as_str()) {
            Some(c) if !c.is_empty() => c,
            _ => return ToolResult::error("content must be a non-empty string"),
        };
        let is_final = input.get("final").and_then(|v| v.as_bool()).unwrap_or(true);

        if let Some(sink) = &ctx.sink {
            sink.send(content).await;
        }

        ToolResult::ok(serde_json::json!({ "final": is_final, "sent": true }))
    }
}
