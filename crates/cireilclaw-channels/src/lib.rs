pub mod channel;
pub mod chunker;
pub mod error;
pub mod inbound;
pub mod manager;
pub mod types;

pub use channel::ChannelAdapter;
pub use chunker::split_chunks;
pub use error::ChannelError;
pub use inbound::InboundSink;
pub use manager::ChannelManager;
pub use types::{ChannelStatus, MessageFormat, OutboundMessage};
