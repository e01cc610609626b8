use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an agent principal. URL-safe slug, e.g. `"main"`, `"research-bot"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentSlug(pub String);

impl AgentSlug {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// The default single-agent setup uses "main".
    pub fn main() -> Self {
        Self("main".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentSlug {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Discriminates the three session variants. Each carries the channel-specific
/// fields needed to address the endpoint and to compute the session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum Channel {
    Discord {
        channel_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        guild_id: Option<String>,
        #[serde(default)]
        is_nsfw: bool,
    },
    Matrix {
        room_id: String,
    },
    /// Ephemeral, never persisted — used for isolated scheduler runs.
    Internal {
        job_id: String,
    },
}

impl Channel {
    /// The session id this channel maps to.
    pub fn session_id(&self) -> SessionId {
        let id = match self {
            Channel::Discord {
                channel_id,
                guild_id: Some(guild_id),
                ..
            } => format!("discord:{channel_id}|{guild_id}"),
            Channel::Discord { channel_id, .. } => format!("discord:{channel_id}"),
            Channel::Matrix { room_id } => format!("matrix:{room_id}"),
            Channel::Internal { job_id } => format!("cron:{job_id}"),
        };
        SessionId(id)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Channel::Discord { .. } => "discord",
            Channel::Matrix { .. } => "matrix",
            Channel::Internal { .. } => "internal",
        }
    }

    /// Sub-key used to look up a channel override in `EngineConfig`: the
    /// guild id for Discord, the room id for Matrix, `None` for internal.
    pub fn override_key(&self) -> Option<&str> {
        match self {
            Channel::Discord { guild_id, .. } => guild_id.as_deref(),
            Channel::Matrix { room_id } => Some(room_id.as_str()),
            Channel::Internal { .. } => None,
        }
    }

    /// Whether this session should ever be written to the session store.
    /// Internal sessions are ephemeral and never written back.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Channel::Internal { .. })
    }
}

/// Opaque session identifier, derived deterministically from a [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discord_session_id_without_guild() {
        let ch = Channel::Discord {
            channel_id: "123".into(),
            guild_id: None,
            is_nsfw: false,
        };
        assert_eq!(ch.session_id().as_str(), "discord:123");
    }

    #[test]
    fn discord_session_id_with_guild() {
        let ch = Channel::Discord {
            channel_id: "123".into(),
            guild_id: Some("456".into()),
            is_nsfw: false,
        };
        assert_eq!(ch.session_id().as_str(), "discord:123|456");
    }

    #[test]
    fn matrix_session_id() {
        let ch = Channel::Matrix {
            room_id: "!abc:example.org".into(),
        };
        assert_eq!(ch.session_id().as_str(), "matrix:!abc:example.org");
    }

    #[test]
    fn internal_session_never_persisted() {
        let ch = Channel::Internal {
            job_id: "job-1".into(),
        };
        assert_eq!(ch.session_id().as_str(), "cron:job-1");
        assert!(!ch.is_persisted());
    }
}
