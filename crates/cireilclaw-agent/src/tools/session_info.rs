//! Tool: `session-info` — channel-specific identifiers.

use async_trait::async_trait;
use cireilclaw_core::Channel;

use super::{Tool, ToolContext, ToolResult};

pub struct SessionInfoTool;

#[async_trait]
impl Tool for SessionInfoTool {
    fn name(&self) -> &str {
        "session-info"
    }

    fn description(&self) -> &str {
        "Return identifiers for the channel this session is running in."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let info = match ctx.channel {
            Channel::Discord { channel_id, guild_id, is_nsfw } => serde_json::json!({
                "channel": "discord",
                "channelId": channel_id,
                "guildId": guild_id,
                "isNsfw": is_nsfw,
            }),
            Channel::Matrix { room_id } => serde_json::json!({
                "channel": "matrix",
                "roomId": room_id,
            }),
            Channel::Internal { job_id } => serde_json::json!({
                "channel": "internal",
                "jobId": job_id,
            }),
        };
        ToolResult::ok(info)
    }
}
