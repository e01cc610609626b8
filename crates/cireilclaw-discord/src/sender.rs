use std::sync::Arc;

use async_trait::async_trait;
use cireilclaw_channels::{split_chunks, ChannelAdapter, ChannelError, ChannelStatus, OutboundMessage};
use cireilclaw_core::Channel;
use serenity::http::Http;
use serenity::model::id::ChannelId;

use crate::error::DiscordError;

/// Outbound-only Discord handle, independent of the gateway connection.
///
/// Discord's REST API (what actually sends a message) doesn't need the
/// gateway WebSocket to be up, so this is what gets registered with
/// [`cireilclaw_channels::ChannelManager`] for scheduler-driven announces —
/// it stays usable across gateway reconnects, which [`crate::adapter::DiscordAdapter`]
/// handles on its own separately.
pub struct DiscordSender {
    http: Arc<Http>,
}

impl DiscordSender {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    /// Send `text` to `channel_id`, chunked and replying to `reply_to` if given.
    pub async fn send_chunked(
        &self,
        channel_id: ChannelId,
        text: &str,
        reply_to: Option<serenity::model::id::MessageId>,
    ) -> Result<(), DiscordError> {
        for chunk in split_chunks(text) {
            let mut builder = serenity::builder::CreateMessage::new().content(chunk);
            if let Some(id) = reply_to {
                builder = builder.reference_message((channel_id, id));
            }
            channel_id.send_message(&self.http, builder).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for DiscordSender {
    fn name(&self) -> &str {
        "discord"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let Channel::Discord { channel_id, .. } = &msg.channel else {
            return Err(ChannelError::SendFailed(
                "DiscordSender received a non-Discord channel target".to_string(),
            ));
        };
        let id: u64 = channel_id
            .parse()
            .map_err(|e| ChannelError::SendFailed(format!("invalid discord channel id: {e}")))?;
        self.send_chunked(ChannelId::new(id), &msg.content, None)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::Connected
    }
}
