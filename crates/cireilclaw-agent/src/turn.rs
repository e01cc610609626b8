//! The turn engine: assembles context, calls the provider, dispatches
//! tool calls, and decides when a turn is done. There is no pipeline stage
//! beyond the single per-iteration loop described below, and no
//! slash-command surface.

use std::path::PathBuf;
use std::sync::Arc;

use cireilclaw_core::config::{EngineConfig, IntegrationsConfig, ToolsConfig};
use cireilclaw_core::{Channel, Message, ToolCall as CoreToolCall, UserContent};
use cireilclaw_scheduler::SchedulerHandle;
use tracing::{debug, warn};

use crate::client::OpenAiCompatClient;
use crate::context::{to_provider_messages, truncate_and_squash};
use crate::error::{AgentError, Result};
use crate::prompt::{self, PromptContext};
use crate::provider::{ChatRequest, LlmProvider, ToolChoice};
use crate::tools::{self, Tool, ToolContext, TurnSink};

/// History tail window: only the last `MAX_TURNS` turns are sent to the
/// provider, squashing anything older.
const MAX_TURNS: usize = 30;
/// Backstop against a model that never emits a terminal `respond`/`no-response`.
const MAX_ITERATIONS: usize = 25;

/// Everything the turn engine needs besides the session itself. Built once
/// per agent and shared across turns; `engine` is a snapshot taken at the
/// start of context assembly so a concurrent config hot-reload cannot affect
/// an in-flight turn.
pub struct TurnDeps<'a> {
    pub agent_root: PathBuf,
    pub agent_slug: String,
    pub engine: EngineConfig,
    pub tools: &'a [Box<dyn Tool>],
    pub tools_config: &'a ToolsConfig,
    pub integrations: &'a IntegrationsConfig,
    pub scheduler: Option<&'a SchedulerHandle>,
    pub sink: Option<Arc<dyn TurnSink>>,
    pub http: reqwest::Client,
}

/// Runs one full turn against `session`, mutating its history, pinned
/// files, and pending queues in place. On any unhandled error, rolls
/// `session.history` back to its pre-turn length.
pub async fn run_turn(session: &mut cireilclaw_sessions::Session, deps: &TurnDeps<'_>) -> Result<()> {
    let history_len_before = session.history.len();
    match run_turn_inner(session, deps).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "turn failed, rolling back history");
            session.history.truncate(history_len_before);
            session.pending_tool_responses.clear();
            Err(e)
        }
    }
}

async fn run_turn_inner(session: &mut cireilclaw_sessions::Session, deps: &TurnDeps<'_>) -> Result<()> {
    let mut iterations = 0usize;

    loop {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(AgentError::IterationCapExceeded);
        }

        // Step 1: drain pending images into a synthetic user message.
        if !session.pending_images.is_empty() {
            let content: Vec<UserContent> = session.pending_images.drain(..).map(UserContent::Image).collect();
            session.pending_tool_responses.push(Message::User { content, id: None, persist: None });
        }

        // Step 2: assemble context and call the provider.
        let system = prompt::assemble(&PromptContext {
            agent_root: &deps.agent_root,
            channel: &session.channel,
            pinned_files: &session.pinned_files,
        });

        let domain_messages = truncate_and_squash(&session.history, &session.pending_tool_responses, MAX_TURNS);
        let mut provider_messages = to_provider_messages(&domain_messages);

        let (tool_choice, coercion) = resolve_tool_choice(&deps.engine.model);
        if let Some(note) = coercion {
            provider_messages.push(serde_json::json!({ "role": "system", "content": note }));
        }

        let override_key = channel_override_key(&session.channel);
        let resolved = deps.engine.resolve(channel_kind(&session.channel), override_key.as_deref());
        let provider = OpenAiCompatClient::new(resolved.api_base.clone(), resolved.api_key.clone());

        let req = ChatRequest {
            model: resolved.model.clone(),
            system,
            messages: provider_messages,
            tools: tools::to_definitions(deps.tools),
            tool_choice,
        };

        debug!(iteration = iterations, model = %req.model, "calling provider");
        let resp = provider.send(&req).await?;

        if resp.finish_reason == "content_filter" {
            return Err(AgentError::ContentFiltered);
        }
        if resp.finish_reason != "tool_calls" {
            return Err(AgentError::UnexpectedFinish(resp.finish_reason));
        }
        if resp.tool_calls.is_empty() {
            return Err(AgentError::UnexpectedFinish("empty tool_calls".to_string()));
        }

        // Step 3: commit pending tool responses into history, clear pending.
        session.history.append(&mut session.pending_tool_responses);
        session.pending_tool_responses.clear();

        // Step 4: append the assistant message.
        let assistant_calls: Vec<CoreToolCall> = resp
            .tool_calls
            .iter()
            .map(|tc| CoreToolCall { id: tc.id.clone(), name: tc.name.clone(), input: tc.input.clone() })
            .collect();
        let assistant_text = if resp.content.is_empty() { None } else { Some(resp.content.clone()) };
        session.history.push(Message::assistant_tool_calls(assistant_calls, assistant_text));

        // Step 5: dispatch each tool call.
        let mut done = false;
        for tc in &resp.tool_calls {
            let call = crate::provider::ToolCall { id: tc.id.clone(), name: tc.name.clone(), input: tc.input.clone() };

            let mut ctx = ToolContext {
                agent_root: deps.agent_root.clone(),
                agent_slug: deps.agent_slug.clone(),
                channel: &session.channel,
                pinned_files: &mut session.pinned_files,
                pending_images: &mut session.pending_images,
                tools_config: deps.tools_config,
                integrations: deps.integrations,
                scheduler: deps.scheduler,
                sink: deps.sink.clone(),
                http: deps.http.clone(),
            };

            let result = tools::tool_loop::execute_tool(deps.tools, &call, &mut ctx).await;
            session
                .pending_tool_responses
                .push(Message::tool_response(call.id.clone(), call.name.clone(), result.output.clone()));

            if call.name == "respond" || call.name == "no-response" {
                let is_final = result.output.get("final").and_then(|v| v.as_bool()).unwrap_or(true);
                if is_final {
                    done = true;
                }
            }
        }

        // Step 6: either finish or loop.
        if done {
            session.history.append(&mut session.pending_tool_responses);
            session.pending_tool_responses.clear();
            return Ok(());
        }
    }
}

/// Substitutes `tool_choice = "auto"` plus a coercion note for model
/// identifiers matching Kimi 2.5, which rejects `tool_choice = "required"`.
fn resolve_tool_choice(model: &str) -> (ToolChoice, Option<String>) {
    let lower = model.to_ascii_lowercase();
    if lower.contains("kimi") && lower.contains("2.5") {
        (
            ToolChoice::Auto,
            Some("You must respond by calling exactly one of the available tools.".to_string()),
        )
    } else {
        (ToolChoice::Required, None)
    }
}

fn channel_kind(channel: &Channel) -> &'static str {
    match channel {
        Channel::Discord { .. } => "discord",
        Channel::Matrix { .. } => "matrix",
        Channel::Internal { .. } => "internal",
    }
}

fn channel_override_key(channel: &Channel) -> Option<String> {
    match channel {
        Channel::Discord { guild_id, .. } => guild_id.clone(),
        Channel::Matrix { room_id } => Some(room_id.clone()),
        Channel::Internal { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kimi_2_5_falls_back_to_auto() {
        let (choice, note) = resolve_tool_choice("kimi-2.5-turbo");
        assert_eq!(choice, ToolChoice::Auto);
        assert!(note.is_some());
    }

    #[test]
    fn other_models_require_tool_calls() {
        let (choice, note) = resolve_tool_choice("gpt-4o");
        assert_eq!(choice, ToolChoice::Required);
        assert!(note.is_none());
    }

    #[test]
    fn discord_override_key_is_guild_id() {
        let channel = Channel::Discord { channel_id: "1".into(), guild_id: Some("g".into()), is_nsfw: false };
        assert_eq!(channel_override_key(&channel), Some("g".to_string()));
    }
}
