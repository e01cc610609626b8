//! The tool registry and standard tool set.
//!
//! A tool validates its own input against a schema built into its
//! `input_schema()`, and never throws to the turn engine for a validation
//! failure — it returns `{success: false, error, ...}` instead. Only
//! unexpected I/O errors propagate past a tool (and those are caught inside
//! each tool's `execute`, not by the engine).

pub mod brave_search;
pub mod close_file;
pub mod exec;
pub mod list_dir;
pub mod no_response;
pub mod open_file;
pub mod read;
pub mod read_skill;
pub mod respond;
pub mod schedule;
pub mod session_info;
pub mod str_replace;
pub mod tool_loop;
pub mod write;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cireilclaw_core::config::{IntegrationsConfig, ToolsConfig};
use cireilclaw_core::{Channel, ImageContent};

use crate::provider::ToolDefinition;

/// Result of executing a tool: always a JSON object, in
/// `{success: true, ...}` / `{success: false, error, issues}` shape.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: serde_json::Value,
}

impl ToolResult {
    pub fn ok(mut fields: serde_json::Value) -> Self {
        if let Some(obj) = fields.as_object_mut() {
            obj.insert("success".to_string(), serde_json::json!(true));
        }
        Self { output: fields }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: serde_json::json!({ "success": false, "error": message.into() }),
        }
    }

    pub fn error_with_code(code: &str, message: impl Into<String>) -> Self {
        Self {
            output: serde_json::json!({ "success": false, "error": message.into(), "code": code }),
        }
    }
}

/// Capability the `respond` tool uses to deliver content to the channel
/// (`ctx.send`). Kept separate from the session store so tools never
/// need write access to the harness's channel registry directly.
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn send(&self, content: &str);
}

/// Per-turn state and capabilities passed to every tool invocation: the
/// session's agent root/slug/channel, its mutable pinned-files and
/// pending-images queues, and the capabilities (`scheduler`, `sink`, `http`)
/// a tool may need.
pub struct ToolContext<'a> {
    pub agent_root: PathBuf,
    pub agent_slug: String,
    pub channel: &'a Channel,
    pub pinned_files: &'a mut Vec<String>,
    pub pending_images: &'a mut Vec<ImageContent>,
    pub tools_config: &'a ToolsConfig,
    pub integrations: &'a IntegrationsConfig,
    pub scheduler: Option<&'a cireilclaw_scheduler::SchedulerHandle>,
    pub sink: Option<Arc<dyn TurnSink>>,
    pub http: reqwest::Client,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult;
}

/// Builds the standard tool set, filtered by `tools_config`.
pub fn standard_tools(tools_config: &ToolsConfig) -> Vec<Box<dyn Tool>> {
    let mut tools: Vec<Box<dyn Tool>> = vec![
        Box::new(respond::RespondTool),
        Box::new(no_response::NoResponseTool),
        Box::new(read::ReadTool),
        Box::new(open_file::OpenFileTool),
        Box::new(close_file::CloseFileTool),
        Box::new(list_dir::ListDirTool),
        Box::new(write::WriteTool),
        Box::new(str_replace::StrReplaceTool),
        Box::new(brave_search::BraveSearchTool),
        Box::new(read_skill::ReadSkillTool),
        Box::new(exec::ExecTool),
        Box::new(schedule::ScheduleTool),
        Box::new(session_info::SessionInfoTool),
    ];
    tools.retain(|t| tools_config.is_enabled(t.name(), true));
    tools
}

/// Converts the visible tool list to API-level definitions.
pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
