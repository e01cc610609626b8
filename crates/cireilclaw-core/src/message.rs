use serde::{Deserialize, Serialize};

/// One piece of user-authored content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContent {
    Text { content: String },
    Image(ImageContent),
}

/// One piece of assistant-authored content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantContent {
    Text { content: String },
    Image(ImageContent),
    ToolCall(ToolCall),
}

/// Raw image bytes plus their media type. Externalized to a content-addressed
/// file on session write (see `cireilclaw-sessions`); in memory the bytes are
/// always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub media_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The output of a dispatched tool call, paired by `id` with the `ToolCall`
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponseContent {
    pub id: String,
    pub name: String,
    pub output: serde_json::Value,
}

/// One or many content items — most message constructors accept either a bare
/// item or an array, matching `UserContent | [UserContent]` in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(v) => v,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(_) => std::slice::from_ref(match self {
                OneOrMany::One(t) => t,
                OneOrMany::Many(_) => unreachable!(),
            }),
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(t: T) -> Self {
        OneOrMany::One(t)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(v: Vec<T>) -> Self {
        OneOrMany::Many(v)
    }
}

/// A turn-history entry. Tagged union over roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Vec<UserContent>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        persist: Option<bool>,
    },
    Assistant {
        content: Vec<AssistantContent>,
    },
    ToolResponse {
        content: ToolResponseContent,
    },
    System {
        content: String,
    },
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User {
            content: vec![UserContent::Text {
                content: text.into(),
            }],
            id: None,
            persist: None,
        }
    }

    pub fn system_text(text: impl Into<String>) -> Self {
        Message::System {
            content: text.into(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: vec![AssistantContent::Text {
                content: text.into(),
            }],
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCall>, text: Option<String>) -> Self {
        let mut content = Vec::new();
        if let Some(text) = text {
            if !text.is_empty() {
                content.push(AssistantContent::Text { content: text });
            }
        }
        content.extend(calls.into_iter().map(AssistantContent::ToolCall));
        Message::Assistant { content }
    }

    pub fn tool_response(id: impl Into<String>, name: impl Into<String>, output: serde_json::Value) -> Self {
        Message::ToolResponse {
            content: ToolResponseContent {
                id: id.into(),
                name: name.into(),
                output,
            },
        }
    }

    /// The role discriminator as used for squashing ("Consecutive same-role
    /// messages are semantically equivalent to a single message").
    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResponse { .. } => "tool_response",
            Message::System { .. } => "system",
        }
    }

    /// True if this message begins a new turn ("a turn begins at a
    /// user-role message or at the start").
    pub fn begins_turn(&self) -> bool {
        matches!(self, Message::User { .. })
    }

    /// All tool-call ids carried by this message, if it is an assistant
    /// message with tool calls.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        match self {
            Message::Assistant { content } => content
                .iter()
                .filter_map(|c| match c {
                    AssistantContent::ToolCall(tc) => Some(tc.id.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        use base64::Engine;
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_role_is_user() {
        let m = Message::user_text("hi");
        assert_eq!(m.role(), "user");
        assert!(m.begins_turn());
    }

    #[test]
    fn assistant_tool_call_ids_collected() {
        let m = Message::assistant_tool_calls(
            vec![
                ToolCall {
                    id: "a".into(),
                    name: "respond".into(),
                    input: serde_json::json!({}),
                },
                ToolCall {
                    id: "b".into(),
                    name: "list-dir".into(),
                    input: serde_json::json!({}),
                },
            ],
            None,
        );
        assert_eq!(m.tool_call_ids(), vec!["a", "b"]);
    }

    #[test]
    fn system_message_does_not_begin_turn() {
        let m = Message::system_text("note");
        assert!(!m.begins_turn());
    }
}
