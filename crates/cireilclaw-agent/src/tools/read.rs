//! Tool: `read` — read a file, re-encoding images into the session's pending
//! image queue.

use async_trait::async_trait;
use cireilclaw_core::ImageContent;
use cireilclaw_sandbox::resolver;

use super::{Tool, ToolContext, ToolResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const WEBP_QUALITY: f32 = 90.0;

pub struct ReadTool;

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read a file. Images are re-encoded to WebP and queued for delivery to the model; other files return their text content."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Virtual path under /workspace, /memories, /blocks, or /skills." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let path = match input.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("missing required parameter: path"),
        };

        let resolved = match resolver::resolve(&ctx.agent_root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let extension = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        if let Some(ext) = extension.as_deref() {
            if IMAGE_EXTENSIONS.contains(&ext) {
                return read_image(&resolved, path, ctx);
            }
        }

        match std::fs::read_to_string(&resolved) {
            Ok(content) => {
                let size = content.len();
                ToolResult::ok(serde_json::json!({ "content": content, "path": path, "size": size }))
            }
            Err(e) => ToolResult::error(format!("failed to read '{path}': {e}")),
        }
    }
}

fn read_image(resolved: &std::path::Path, virtual_path: &str, ctx: &mut ToolContext<'_>) -> ToolResult {
    let bytes = match std::fs::read(resolved) {
        Ok(b) => b,
        Err(e) => return ToolResult::error(format!("failed to read '{virtual_path}': {e}")),
    };

    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => return ToolResult::error(format!("failed to decode image '{virtual_path}': {e}")),
    };

    let mut webp_bytes = Vec::new();
    let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut webp_bytes);
    // `image`'s WebP encoder only supports lossless in this feature set; the
    // quality constant is kept for documentation but has no lossy encoder
    // to apply it to here.
    let _ = WEBP_QUALITY;
    if let Err(e) = encoder.encode(
        decoded.to_rgba8().as_raw(),
        decoded.width(),
        decoded.height(),
        image::ExtendedColorType::Rgba8,
    ) {
        return ToolResult::error(format!("failed to encode webp: {e}"));
    }

    let size = webp_bytes.len();
    ctx.pending_images.push(ImageContent {
        media_type: "image/webp".to_string(),
        data: webp_bytes,
    });

    ToolResult::ok(serde_json::json!({ "path": virtual_path, "size": size, "mediaType": "image/webp" }))
}
