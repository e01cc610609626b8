//! Tool dispatch helper shared by the turn engine.

use tracing::debug;

use crate::provider::ToolCall;

use super::{Tool, ToolContext, ToolResult};

/// Finds and executes the named tool. An unknown tool name is itself a
/// validation-shaped failure, not an engine error.
pub async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall, ctx: &mut ToolContext<'_>) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            tool.execute(call.input.clone(), ctx).await
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}
