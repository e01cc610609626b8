pub mod adapter;
pub mod error;
pub mod handler;
pub mod sender;

pub use adapter::MatrixAdapter;
pub use cireilclaw_channels::InboundSink;
pub use error::MatrixError;
pub use sender::MatrixSender;
