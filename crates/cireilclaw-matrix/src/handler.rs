use std::sync::Arc;

use cireilclaw_channels::InboundSink;
use cireilclaw_core::Channel;
use matrix_sdk::room::Room;
use matrix_sdk::ruma::events::room::message::{MessageType, RoomMessageEventContent, SyncRoomMessageEvent};
use matrix_sdk::Client;
use tracing::warn;

use crate::sender::MatrixSender;

/// Registers the room-message callback that turns incoming Matrix events
/// into turns, mirroring `cireilclaw_discord::handler`'s shape. Reuses
/// `cireilclaw_channels::InboundSink` rather than declaring a second copy of
/// the same seam — both adapters hand off to the same harness trait.
pub fn register<H: InboundSink + 'static>(client: &Client, sink: Arc<H>) {
    let sender = MatrixSender::new(client.clone());
    let own_user_id = client.user_id().map(|id| id.to_owned());

    client.add_event_handler(move |ev: SyncRoomMessageEvent, room: Room| {
        let sink = Arc::clone(&sink);
        let sender = MatrixSender::new(sender_client(&room));
        let own_user_id = own_user_id.clone();
        async move {
            let SyncRoomMessageEvent::Original(ev) = ev else {
                return;
            };
            if Some(&ev.sender) == own_user_id.as_ref() {
                return;
            }
            let MessageType::Text(text) = ev.content.msgtype else {
                return;
            };
            let content = text.body.trim().to_string();
            if content.is_empty() {
                return;
            }

            let channel = Channel::Matrix {
                room_id: room.room_id().to_string(),
            };

            match sink.handle_turn(channel, content).await {
                Ok(reply) => {
                    if let Err(e) = sender.send_chunked(room.room_id(), &reply).await {
                        warn!(error = %e, "Matrix reply send failed");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Matrix turn handling failed");
                    let _ = room
                        .send(RoomMessageEventContent::text_plain(
                            "engine error, please try again",
                        ))
                        .await;
                }
            }
        }
    });
}

fn sender_client(room: &Room) -> Client {
    room.client()
}
