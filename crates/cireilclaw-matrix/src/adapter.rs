use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cireilclaw_channels::InboundSink;
use cireilclaw_core::config::MatrixChannelConfig;
use matrix_sdk::config::SyncSettings;
use matrix_sdk::matrix_auth::{MatrixSession, MatrixSessionTokens};
use matrix_sdk::ruma::{DeviceId, OwnedUserId};
use matrix_sdk::{Client, SessionMeta};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::MatrixError;
use crate::handler;

/// Fixed device id for the bot's single persistent session. The config
/// surface (`MatrixChannelConfig`) carries a bare access token, not a
/// full login flow, so there is no separate device to disambiguate.
const DEVICE_ID: &str = "CIREILCLAW";

/// Matrix sync adapter. Unlike Discord's gateway, `Client::sync` already
/// retries transient connection drops internally; this loop only restarts
/// the sync stream if it exits with an error, mirroring the spirit of
/// `cireilclaw_discord::adapter`'s outer reconnect loop.
pub struct MatrixAdapter<H: InboundSink + 'static> {
    sink: Arc<H>,
    config: MatrixChannelConfig,
    store_path: std::path::PathBuf,
}

impl<H: InboundSink + 'static> MatrixAdapter<H> {
    pub fn new(config: MatrixChannelConfig, sink: Arc<H>, agent_root: &Path) -> Self {
        let store_path = agent_root.join("workspace").join("matrix_store");
        Self {
            sink,
            config,
            store_path,
        }
    }

    /// Connect to the homeserver and keep the sync loop running, until
    /// `shutdown` broadcasts true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let client = loop {
            tokio::select! {
                result = self.build_client() => {
                    match result {
                        Ok(c) => break c,
                        Err(e) => {
                            error!("Matrix: connect failed ({e}), retrying in 30s");
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                                _ = shutdown.changed() => {
                                    if *shutdown.borrow() {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        };

        handler::register(&client, Arc::clone(&self.sink));

        loop {
            info!("Matrix: sync starting");
            tokio::select! {
                result = client.sync(SyncSettings::default()) => {
                    match result {
                        Err(e) => warn!("Matrix: sync error ({e}), reconnecting in 5s"),
                        Ok(()) => info!("Matrix: sync stopped cleanly, reconnecting in 5s"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Matrix: shutting down");
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
        }
    }

    async fn build_client(&self) -> Result<Client, MatrixError> {
        login(&self.config, &self.store_path).await
    }
}

/// Builds a logged-in `Client` from a stored access token. Standalone so the
/// harness can build one for [`crate::sender::MatrixSender`] (scheduler-driven
/// announces) independently of a running [`MatrixAdapter`] sync loop.
pub async fn login(config: &MatrixChannelConfig, store_path: &Path) -> Result<Client, MatrixError> {
    let client = Client::builder()
        .homeserver_url(&config.homeserver_url)
        .sqlite_store(store_path, None)
        .build()
        .await?;

    let user_id: OwnedUserId = config.user_id.parse().map_err(|_| MatrixError::NotLoggedIn)?;
    let device_id: &DeviceId = DEVICE_ID.into();

    client
        .matrix_auth()
        .restore_session(MatrixSession {
            meta: SessionMeta {
                user_id,
                device_id: device_id.to_owned(),
            },
            tokens: MatrixSessionTokens {
                access_token: config.access_token.clone(),
                refresh_token: None,
            },
        })
        .await?;

    Ok(client)
}
