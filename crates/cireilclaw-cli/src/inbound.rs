//! The harness's [`InboundSink`] implementation: what Discord/Matrix adapters
//! call for every inbound message.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cireilclaw_channels::InboundSink;
use cireilclaw_core::{Channel, Message};

use crate::runtime::AgentRuntime;
use crate::send_filter::SendFilter;
use crate::turn_sink::HarnessSink;

/// Poll window for a busy session: wait up to 5s, polling every 500ms, and
/// drop the event if the session is still busy.
const BUSY_POLL_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct AgentInboundSink {
    runtime: Arc<AgentRuntime>,
}

impl AgentInboundSink {
    pub fn new(runtime: Arc<AgentRuntime>) -> Arc<Self> {
        Arc::new(Self { runtime })
    }
}

#[async_trait]
impl InboundSink for AgentInboundSink {
    async fn handle_turn(
        &self,
        channel: Channel,
        content: String,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let handle = self.runtime.session_handle(&channel);
        let session_id = channel.session_id();

        let mut guard = match acquire_with_poll(&handle).await {
            Some(g) => g,
            None => return Ok(String::new()),
        };

        // Captured rather than forwarded through the channel manager: the
        // calling adapter delivers the returned text itself (see
        // `cireilclaw_discord::sender::DiscordSender`).
        self.runtime
            .install_send_filter(session_id.clone(), SendFilter::capture_all());
        let sink = HarnessSink::new(Arc::clone(&self.runtime), session_id.clone(), channel);

        let result = self
            .runtime
            .execute_turn(&mut guard, Message::user_text(content), sink)
            .await;

        let captured = self
            .runtime
            .take_send_filter(&session_id)
            .and_then(SendFilter::into_captured)
            .unwrap_or_default();

        result?;
        Ok(captured)
    }
}

async fn acquire_with_poll(
    handle: &Arc<tokio::sync::Mutex<cireilclaw_sessions::Session>>,
) -> Option<tokio::sync::MutexGuard<'_, cireilclaw_sessions::Session>> {
    let deadline = tokio::time::Instant::now() + BUSY_POLL_TIMEOUT;
    loop {
        if let Ok(guard) = handle.try_lock() {
            return Some(guard);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(BUSY_POLL_INTERVAL).await;
    }
}
