//! Tool: `brave-search` — web search via the Brave Search API.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Tool, ToolContext, ToolResult};

const DEFAULT_COUNT: u64 = 5;
const MAX_COUNT: u64 = 20;

pub struct BraveSearchTool;

#[async_trait]
impl Tool for BraveSearchTool {
    fn name(&self) -> &str {
        "brave-search"
    }

    fn description(&self) -> &str {
        "Search the web using the Brave Search API."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "count": { "type": "integer", "minimum": 1, "maximum": MAX_COUNT }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.is_empty() => q,
            _ => return ToolResult::error("query must be a non-empty string"),
        };
        let count = input
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_COUNT)
            .clamp(1, MAX_COUNT);

        let Some(brave) = &ctx.integrations.brave else {
            return ToolResult::error_with_code("not_configured", "brave search is not configured for this agent");
        };

        let resp = match ctx
            .http
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &brave.api_key)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return ToolResult::error(format!("search request failed: {e}")),
        };

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return ToolResult::error(format!("brave search returned {status}: {body}"));
        }

        let parsed: BraveResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("failed to parse brave search response: {e}")),
        };

        let results: Vec<serde_json::Value> = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| serde_json::json!({ "title": r.title, "url": r.url, "description": r.description }))
            .collect();

        ToolResult::ok(serde_json::json!({ "query": query, "results": results }))
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}
