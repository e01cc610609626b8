pub mod config;
pub mod error;
pub mod message;
pub mod types;

pub use error::{ConfigError, Result};
pub use message::{AssistantContent, ImageContent, Message, OneOrMany, ToolCall, ToolResponseContent, UserContent};
pub use types::{AgentSlug, Channel, SessionId};
