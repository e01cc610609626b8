pub mod ack;
pub mod adapter;
pub mod error;
pub mod handler;
pub mod sender;

pub use adapter::DiscordAdapter;
pub use cireilclaw_channels::InboundSink;
pub use error::DiscordError;
pub use sender::DiscordSender;
