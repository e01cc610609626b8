use std::sync::{Arc, OnceLock};

use cireilclaw_core::{config::DiscordChannelConfig, Channel};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{info, warn};

use crate::ack::AckHandle;
use cireilclaw_channels::InboundSink;
use crate::sender::DiscordSender;

pub struct DiscordHandler<H: InboundSink + 'static> {
    pub sink: Arc<H>,
    pub config: DiscordChannelConfig,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl<H: InboundSink + 'static> EventHandler for DiscordHandler<H> {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(name = %ready.user.name, "Discord bot connected");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let is_guild = msg.guild_id.is_some();
        if is_guild && self.config.require_mention {
            let Some(bot_id) = self.bot_id.get() else {
                return;
            };
            if !msg.mentions_user_id(*bot_id) {
                return;
            }
        }
        if !is_guild && !self.config.dm_allowed {
            return;
        }

        let content = strip_mention(&msg.content).trim().to_string();
        if content.is_empty() {
            return;
        }

        let channel = Channel::Discord {
            channel_id: msg.channel_id.to_string(),
            guild_id: msg.guild_id.map(|g| g.to_string()),
            is_nsfw: msg
                .channel_id
                .to_channel(&ctx.http)
                .await
                .is_ok_and(|c| c.guild().is_some_and(|gc| gc.nsfw)),
        };

        let _ = msg.channel_id.broadcast_typing(&ctx.http).await;
        let mut ack = AckHandle::new(Arc::clone(&ctx.http), msg.channel_id, msg.id);
        ack.thinking().await;

        let sink = Arc::clone(&self.sink);
        let sender = DiscordSender::new(Arc::clone(&ctx.http));
        let channel_id = msg.channel_id;
        let reply_to = msg.id;

        tokio::spawn(async move {
            match sink.handle_turn(channel, content).await {
                Ok(reply) => {
                    ack.done_ok().await;
                    if let Err(e) = sender.send_chunked(channel_id, &reply, Some(reply_to)).await {
                        warn!(error = %e, "Discord reply send failed");
                    }
                }
                Err(e) => {
                    ack.done_err().await;
                    warn!(error = %e, "Discord turn handling failed");
                    let _ = sender
                        .send_chunked(channel_id, "engine error, please try again", Some(reply_to))
                        .await;
                }
            }
        });
    }
}

/// Remove an @mention prefix (e.g. `<@123456789>`) from a message.
fn strip_mention(s: &str) -> &str {
    let trimmed = s.trim_start();
    if trimmed.starts_with("<@") {
        if let Some(end) = trimmed.find('>') {
            return trimmed[end + 1..].trim_start();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_mention_removes_leading_mention() {
        assert_eq!(strip_mention("<@123456789> hello"), "hello");
    }

    #[test]
    fn strip_mention_leaves_plain_text_alone() {
        assert_eq!(strip_mention("hello there"), "hello there");
    }
}
