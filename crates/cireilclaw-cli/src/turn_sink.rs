//! The `TurnSink` the harness hands to every turn (`ctx.sink`, //! `send(session, content)`). One instance is built per turn, bound to the
//! session it is answering.

use std::sync::Arc;

use async_trait::async_trait;
use cireilclaw_agent::tools::TurnSink;
use cireilclaw_core::{Channel, SessionId};

use crate::runtime::AgentRuntime;

pub struct HarnessSink {
    runtime: Arc<AgentRuntime>,
    session_id: SessionId,
    channel: Channel,
}

impl HarnessSink {
    pub fn new(runtime: Arc<AgentRuntime>, session_id: SessionId, channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            session_id,
            channel,
        })
    }
}

#[async_trait]
impl TurnSink for HarnessSink {
    async fn send(&self, content: &str) {
        self.runtime.dispatch_send(&self.session_id, &self.channel, content).await;
    }
}
