//! Message-list assembly for the turn engine: history truncation/squashing,
//! then mapping the result to the provider's wire format.

use base64::Engine;
use cireilclaw_core::{AssistantContent, Message, UserContent};

/// Tail-truncate `history` to the last `max_turns` turns (a turn begins at a
/// user-role message, or at index 0 regardless of its role), then append
/// `pending` and squash consecutive same-role (user/assistant) messages.
pub fn truncate_and_squash(history: &[Message], pending: &[Message], max_turns: usize) -> Vec<Message> {
    let tail = truncate_tail(history, max_turns);
    let mut combined: Vec<Message> = tail.to_vec();
    combined.extend(pending.iter().cloned());
    squash(combined)
}

fn truncate_tail(history: &[Message], max_turns: usize) -> &[Message] {
    if history.is_empty() {
        return history;
    }
    let mut boundaries = vec![0usize];
    for (i, m) in history.iter().enumerate().skip(1) {
        if m.begins_turn() {
            boundaries.push(i);
        }
    }
    if boundaries.len() > max_turns {
        let cut = boundaries[boundaries.len() - max_turns];
        &history[cut..]
    } else {
        history
    }
}

fn squash(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for m in messages {
        let merged = if let Some(last) = out.last_mut() {
            match (last, &m) {
                (Message::User { content: prev, .. }, Message::User { content, .. }) => {
                    prev.extend(content.clone());
                    true
                }
                (Message::Assistant { content: prev }, Message::Assistant { content }) => {
                    prev.extend(content.clone());
                    true
                }
                _ => false,
            }
        } else {
            false
        };
        if !merged {
            out.push(m);
        }
    }
    out
}

/// Converts squashed domain messages into the provider's JSON wire shape.
pub fn to_provider_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages.iter().map(message_to_json).collect()
}

fn message_to_json(m: &Message) -> serde_json::Value {
    match m {
        Message::User { content, .. } => {
            let parts: Vec<serde_json::Value> = content
                .iter()
                .map(|c| match c {
                    UserContent::Text { content } => serde_json::json!({ "type": "text", "text": content }),
                    UserContent::Image(img) => serde_json::json!({
                        "type": "image_url",
                        "image_url": { "url": format!(
                            "data:{};base64,{}",
                            img.media_type,
                            base64::engine::general_purpose::STANDARD.encode(&img.data)
                        ) }
                    }),
                })
                .collect();
            serde_json::json!({ "role": "user", "content": parts })
        }
        Message::Assistant { content } => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for c in content {
                match c {
                    AssistantContent::Text { content } => {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(content);
                    }
                    AssistantContent::ToolCall(tc) => tool_calls.push(serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": serde_json::to_string(&tc.input).unwrap_or_default(),
                        }
                    })),
                    // The provider protocol has no slot for assistant-authored
                    // images; this variant exists for symmetry with user content
                    // but is never produced by this provider implementation.
                    AssistantContent::Image(_) => {}
                }
            }
            let mut obj = serde_json::Map::new();
            obj.insert("role".to_string(), serde_json::json!("assistant"));
            if !text.is_empty() {
                obj.insert("content".to_string(), serde_json::json!(text));
            }
            if !tool_calls.is_empty() {
                obj.insert("tool_calls".to_string(), serde_json::json!(tool_calls));
            }
            serde_json::Value::Object(obj)
        }
        Message::ToolResponse { content } => serde_json::json!({
            "role": "tool",
            "tool_call_id": content.id,
            "content": serde_json::to_string(&content.output).unwrap_or_default(),
        }),
        Message::System { content } => serde_json::json!({ "role": "system", "content": content }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squashes_consecutive_user_messages() {
        let messages = vec![Message::user_text("a"), Message::user_text("b")];
        let squashed = squash(messages);
        assert_eq!(squashed.len(), 1);
        if let Message::User { content, .. } = &squashed[0] {
            assert_eq!(content.len(), 2);
        } else {
            panic!("expected user message");
        }
    }

    #[test]
    fn does_not_squash_across_tool_response() {
        let messages = vec![
            Message::user_text("a"),
            Message::tool_response("1", "respond", serde_json::json!({"success": true})),
            Message::user_text("b"),
        ];
        let squashed = squash(messages);
        assert_eq!(squashed.len(), 3);
    }

    #[test]
    fn truncate_tail_keeps_last_n_turns() {
        let history: Vec<Message> = (0..10).map(|i| Message::user_text(format!("turn {i}"))).collect();
        let tail = truncate_tail(&history, 3);
        assert_eq!(tail.len(), 3);
    }

    #[test]
    fn tool_response_converts_to_tool_role() {
        let m = Message::tool_response("42", "read", serde_json::json!({"success": true}));
        let json = message_to_json(&m);
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "42");
    }
}
