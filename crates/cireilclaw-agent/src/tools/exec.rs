//! Tool: `exec` — run an allowlisted binary in the sandbox jail.

use async_trait::async_trait;
use cireilclaw_sandbox::jail::{self, ExecRequest};

use super::{Tool, ToolContext, ToolResult};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub struct ExecTool;

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Run a command against the configured binary allowlist inside the sandbox jail."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "args": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let command = match input.get("command").and_then(|v| v.as_str()) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => return ToolResult::error("command must be a non-empty string"),
        };
        let args: Vec<String> = input
            .get("args")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let allowed_binaries = ctx.tools_config.exec_allowed_binaries();
        if allowed_binaries.is_empty() {
            return ToolResult::error_with_code("not_configured", "exec has no allowed binaries configured");
        }

        let request = ExecRequest {
            command,
            args,
            allowed_binaries,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            agent_slug: ctx.agent_slug.clone(),
            agent_root: ctx.agent_root.clone(),
        };

        match jail::run(request).await {
            Ok(output) => ToolResult::ok(serde_json::json!({
                "exitCode": output.exit_code,
                "stdout": output.stdout,
                "stderr": output.stderr,
            })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
