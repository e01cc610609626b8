//! Content-addressed image externalization for `PersistedSessionRow`.
//!
//! Image bytes never live in `history_json`; they are hashed with BLAKE3,
//! written once to `{agent_root}/images/{id}.{ext}`, and replaced in the
//! serialized history by an `image_ref` pointer. The `images` table indexes
//! which sessions reference which ids so garbage collection can tell a
//! still-referenced image from an orphan.

use std::path::Path;

use base64::Engine;
use serde_json::{Map, Value};

use crate::error::Result;

/// One `(id, mediaType)` pair recorded for an image referenced during
/// externalization, for the caller to upsert into the `images` table.
pub struct ImageRef {
    pub id: String,
    pub media_type: String,
}

/// Walks a serialized history, replacing every `image` content node with an
/// `image_ref` node and flushing new image bytes to disk.
pub fn externalize(history: &Value, agent_root: &Path) -> Result<(Value, Vec<ImageRef>)> {
    let mut refs = Vec::new();
    let rewritten = walk(history, agent_root, &mut refs)?;
    Ok((rewritten, refs))
}

/// Walks a deserialized history, replacing every `image_ref` node with an
/// inline `image` node by reading the referenced file back.
pub fn rehydrate(history: &Value, agent_root: &Path) -> Result<Value> {
    walk_rehydrate(history, agent_root)
}

fn walk(value: &Value, agent_root: &Path, refs: &mut Vec<ImageRef>) -> Result<Value> {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("image") {
                if let (Some(media_type), Some(data)) = (
                    map.get("media_type").and_then(Value::as_str),
                    map.get("data").and_then(Value::as_str),
                ) {
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(data)
                        .unwrap_or_default();
                    let id = blake3::hash(&bytes).to_hex().to_string();
                    let ext = extension_for(media_type);
                    let path = agent_root.join("images").join(format!("{id}.{ext}"));
                    if !path.exists() {
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(&path, &bytes)?;
                    }
                    refs.push(ImageRef {
                        id: id.clone(),
                        media_type: media_type.to_string(),
                    });
                    let mut out = Map::new();
                    out.insert("type".into(), Value::String("image_ref".into()));
                    out.insert("id".into(), Value::String(id));
                    out.insert("media_type".into(), Value::String(media_type.to_string()));
                    return Ok(Value::Object(out));
                }
            }
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), walk(v, agent_root, refs)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(item, agent_root, refs)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn walk_rehydrate(value: &Value, agent_root: &Path) -> Result<Value> {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("image_ref") {
                if let (Some(id), Some(media_type)) = (
                    map.get("id").and_then(Value::as_str),
                    map.get("media_type").and_then(Value::as_str),
                ) {
                    let ext = extension_for(media_type);
                    let path = agent_root.join("images").join(format!("{id}.{ext}"));
                    let bytes = std::fs::read(&path)?;
                    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
                    let mut out = Map::new();
                    out.insert("type".into(), Value::String("image".into()));
                    out.insert("media_type".into(), Value::String(media_type.to_string()));
                    out.insert("data".into(), Value::String(data));
                    return Ok(Value::Object(out));
                }
            }
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), walk_rehydrate(v, agent_root)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk_rehydrate(item, agent_root)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn externalize_then_rehydrate_roundtrips_bytes() {
        let dir = tempdir().unwrap();
        let bytes = vec![1u8, 2, 3, 4, 5];
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let history = serde_json::json!([{
            "role": "user",
            "content": [{"type": "image", "media_type": "image/png", "data": data}]
        }]);

        let (externalized, refs) = externalize(&history, dir.path()).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].media_type, "image/png");
        assert_eq!(
            externalized[0]["content"][0]["type"].as_str(),
            Some("image_ref")
        );

        let rehydrated = rehydrate(&externalized, dir.path()).unwrap();
        let data_back = rehydrated[0]["content"][0]["data"].as_str().unwrap();
        let bytes_back = base64::engine::general_purpose::STANDARD
            .decode(data_back)
            .unwrap();
        assert_eq!(bytes_back, bytes);
    }

    #[test]
    fn externalize_is_idempotent_for_duplicate_images() {
        let dir = tempdir().unwrap();
        let bytes = vec![9u8; 16];
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let history = serde_json::json!([
            {"role": "user", "content": [{"type": "image", "media_type": "image/png", "data": data.clone()}]},
            {"role": "user", "content": [{"type": "image", "media_type": "image/png", "data": data}]},
        ]);
        let (_, refs) = externalize(&history, dir.path()).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, refs[1].id);
    }
}
