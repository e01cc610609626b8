//! Tool: `schedule` — persist a one-shot job and arm it live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cireilclaw_core::config::{CronJobConfig, DeliveryMode, ExecutionMode, Schedule};

use super::{Tool, ToolContext, ToolResult};

pub struct ScheduleTool;

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Schedule a one-shot prompt to run at a future time."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "at": { "type": "string", "description": "ISO8601 timestamp" },
                "prompt": { "type": "string" },
                "delivery": { "type": "string", "enum": ["announce", "webhook", "none"] },
                "target": { "type": "string" }
            },
            "required": ["id", "at", "prompt"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let id = match input.get("id").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return ToolResult::error("id must be a non-empty string"),
        };
        let at_str = match input.get("at").and_then(|v| v.as_str()) {
            Some(s) => s,
            None => return ToolResult::error("missing required parameter: at"),
        };
        let prompt = match input.get("prompt").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return ToolResult::error("prompt must be a non-empty string"),
        };

        let at: DateTime<Utc> = match DateTime::parse_from_rfc3339(at_str) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => return ToolResult::error(format!("invalid ISO8601 timestamp '{at_str}': {e}")),
        };
        if at <= Utc::now() {
            return ToolResult::error("at must be in the future");
        }

        let delivery = match input.get("delivery").and_then(|v| v.as_str()).unwrap_or("announce") {
            "announce" => DeliveryMode::Announce,
            "webhook" => DeliveryMode::Webhook,
            "none" => DeliveryMode::None,
            other => return ToolResult::error(format!("unknown delivery mode: {other}")),
        };
        let target = input.get("target").and_then(|v| v.as_str()).unwrap_or("last").to_string();

        let Some(scheduler) = ctx.scheduler else {
            return ToolResult::error_with_code("not_configured", "no scheduler is available in this context");
        };

        let config = CronJobConfig {
            id,
            enabled: true,
            schedule: Schedule::At { at },
            execution: ExecutionMode::Main,
            delivery,
            target,
            prompt,
            model: None,
            webhook_url: None,
        };

        match scheduler.add_job(config) {
            Ok(row) => ToolResult::ok(serde_json::json!({ "id": row.job_id, "nextRun": row.next_run })),
            Err(e) => ToolResult::error(format!("failed to schedule job: {e}")),
        }
    }
}
