use std::sync::{Arc, OnceLock};
use std::time::Duration;

use cireilclaw_core::config::DiscordChannelConfig;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::handler::DiscordHandler;
use cireilclaw_channels::InboundSink;

/// Discord gateway adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process
/// exits, reconnecting automatically whenever the gateway drops. Outbound
/// sends (including scheduler-driven announces) go through [`crate::sender::DiscordSender`]
/// instead, which only needs the REST `Http` client and survives gateway
/// reconnects untouched.
pub struct DiscordAdapter<H: InboundSink + 'static> {
    sink: Arc<H>,
    config: DiscordChannelConfig,
}

impl<H: InboundSink + 'static> DiscordAdapter<H> {
    pub fn new(config: DiscordChannelConfig, sink: Arc<H>) -> Self {
        Self { sink, config }
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops,
    /// until `shutdown` broadcasts true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        let mut client = match self.connect_until_shutdown(intents, &mut shutdown).await {
            Some(c) => c,
            None => return,
        };

        loop {
            info!("Discord: gateway connecting");

            tokio::select! {
                result = client.start() => {
                    match result {
                        Err(e) => warn!("Discord: gateway error ({e}), reconnecting in 5s"),
                        Ok(()) => info!("Discord: gateway stopped cleanly, reconnecting in 5s"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Discord: shutting down");
                        return;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }

            client = match self.connect_until_shutdown(intents, &mut shutdown).await {
                Some(c) => c,
                None => return,
            };
        }
    }

    /// Retries [`Self::build_client`] until it succeeds or `shutdown` fires.
    async fn connect_until_shutdown(
        &self,
        intents: GatewayIntents,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Client> {
        loop {
            tokio::select! {
                result = self.build_client(intents) => {
                    match result {
                        Ok(c) => return Some(c),
                        Err(e) => {
                            error!("Discord: connect failed ({e}), retrying in 30s");
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                                _ = shutdown.changed() => {
                                    if *shutdown.borrow() {
                                        return None;
                                    }
                                }
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
            bot_id: OnceLock::new(),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
