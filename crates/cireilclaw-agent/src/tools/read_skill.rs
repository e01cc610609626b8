//! Tool: `read-skill` — load the full body of a skill by slug.

use async_trait::async_trait;

use super::{Tool, ToolContext, ToolResult};

pub struct ReadSkillTool;

#[async_trait]
impl Tool for ReadSkillTool {
    fn name(&self) -> &str {
        "read-skill"
    }

    fn description(&self) -> &str {
        "Read the full content of a skill, given its slug from the skills index."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "slug": { "type": "string" } },
            "required": ["slug"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let slug = match input.get("slug").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s,
            _ => return ToolResult::error("slug must be a non-empty string"),
        };

        let skills_dir = ctx.agent_root.join("skills");
        match cireilclaw_memory::skill::read_raw(&skills_dir, slug) {
            Ok(content) => ToolResult::ok(serde_json::json!({ "slug": slug, "content": content })),
            Err(e) => ToolResult::error(format!("failed to read skill '{slug}': {e}")),
        }
    }
}
