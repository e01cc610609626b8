use cireilclaw_core::Channel;
use serde::{Deserialize, Serialize};

/// A rendered reply bound for a specific channel target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Which platform target to deliver to (carries the discord channel id
    /// / matrix room id / etc — see [`cireilclaw_core::Channel`]).
    pub channel: Channel,

    /// Content to deliver. Already chunked by [`crate::chunker::split_chunks`]
    /// if it exceeded the platform limit.
    pub content: String,

    /// Formatting hint for the target platform.
    pub format: MessageFormat,
}

/// Formatting hint for outbound message content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Raw text with no special markup.
    #[default]
    PlainText,

    /// Markdown as understood by the target platform.
    Markdown,
}

/// Runtime connection state of a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Fully connected and ready to send/receive.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// An unrecoverable (or pre-retry) error occurred.
    Error(String),
}
