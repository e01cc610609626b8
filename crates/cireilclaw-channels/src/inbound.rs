use async_trait::async_trait;
use cireilclaw_core::Channel;

/// What the harness implements to receive a turn from any channel adapter
/// (Discord, Matrix, …). Decoupled from any concrete agent/turn-engine error
/// type — adapters only need to know whether a reply came back, not why a
/// failure happened.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn handle_turn(
        &self,
        channel: Channel,
        content: String,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
