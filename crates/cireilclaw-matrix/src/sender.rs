use async_trait::async_trait;
use cireilclaw_channels::{split_chunks, ChannelAdapter, ChannelError, ChannelStatus, OutboundMessage};
use cireilclaw_core::Channel;
use matrix_sdk::ruma::events::room::message::RoomMessageEventContent;
use matrix_sdk::ruma::RoomId;
use matrix_sdk::Client;

use crate::error::MatrixError;

/// Outbound-only Matrix handle. A logged-in `Client` can send to any room it
/// has joined regardless of sync state, so this is what the harness
/// registers with `cireilclaw_channels::ChannelManager` for scheduler-driven
/// announces — independent of whatever sync loop [`crate::adapter::MatrixAdapter`]
/// is running.
pub struct MatrixSender {
    client: Client,
}

impl MatrixSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn send_chunked(&self, room_id: &RoomId, text: &str) -> Result<(), MatrixError> {
        let Some(room) = self.client.get_room(room_id) else {
            return Err(MatrixError::RoomNotJoined(room_id.to_string()));
        };
        for chunk in split_chunks(text) {
            room.send(RoomMessageEventContent::text_markdown(chunk)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MatrixSender {
    fn name(&self) -> &str {
        "matrix"
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let Channel::Matrix { room_id } = &msg.channel else {
            return Err(ChannelError::SendFailed(
                "MatrixSender received a non-Matrix channel target".to_string(),
            ));
        };
        let parsed = <&RoomId>::try_from(room_id.as_str())
            .map_err(|e| ChannelError::SendFailed(format!("invalid matrix room id: {e}")))?;
        self.send_chunked(parsed, &msg.content)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::Connected
    }
}
