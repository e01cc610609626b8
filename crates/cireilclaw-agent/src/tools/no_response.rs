//! Tool: `no-response` — ends the turn silently.

use async_trait::async_trait;

use super::{Tool, ToolContext, ToolResult};

pub struct NoResponseTool;

#[async_trait]
impl Tool for NoResponseTool {
    fn name(&self) -> &str {
        "no-response"
    }

    fn description(&self) -> &str {
        "End the turn without sending anything to the user."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value, _ctx: &mut ToolContext<'_>) -> ToolResult {
        ToolResult::ok(serde_json::json!({ "final": true }))
    }
}
