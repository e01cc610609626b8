//! Consumes [`FiredEvent`]s from a per-agent [`cireilclaw_scheduler::SchedulerEngine`]
//! and runs the turn each one implies: resolves a target session, takes the
//! busy gate, installs the right `SendFilter`, runs the turn, and delivers
//! or discards the result.

use std::sync::Arc;

use cireilclaw_core::config::{CronJobConfig, DeliveryMode, ExecutionMode};
use cireilclaw_core::{Channel, SessionId};
use cireilclaw_scheduler::{CronJobRow, FiredEvent};
use cireilclaw_sessions::Session;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{info, warn};

use crate::runtime::{heartbeat_message, AgentRuntime};
use crate::send_filter::SendFilter;
use crate::turn_sink::HarnessSink;

/// Drains `fired_rx` until `shutdown` broadcasts, dispatching each event to
/// a turn. One task per agent, paired 1:1 with that agent's
/// `SchedulerEngine::run` task.
pub async fn run(
    runtime: Arc<AgentRuntime>,
    mut fired_rx: mpsc::Receiver<FiredEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = fired_rx.recv() => {
                match event {
                    Some(FiredEvent::Heartbeat) => handle_heartbeat(&runtime).await,
                    Some(FiredEvent::Cron(job)) => handle_cron(&runtime, job).await,
                    None => break,
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Resolves a `target` string (`"none"`, `"last"`, or an exact session id)
/// to a live session handle.
async fn resolve_target(
    runtime: &Arc<AgentRuntime>,
    target: &str,
) -> Option<Arc<AsyncMutex<Session>>> {
    match target {
        "none" => None,
        "last" => runtime.last_active_session().await,
        id => runtime.session_by_id(&SessionId::from(id.to_string())),
    }
}

/// Runs a heartbeat turn. The scheduler has already checked active hours
/// and checklist presence before emitting this event.
async fn handle_heartbeat(runtime: &Arc<AgentRuntime>) {
    let hb = &runtime.heartbeat;
    let Some(handle) = resolve_target(runtime, &hb.target).await else {
        return;
    };

    let Ok(mut session) = handle.try_lock() else {
        return;
    };

    let session_id = session.channel.session_id();
    let channel = session.channel.clone();

    runtime.install_send_filter(session_id.clone(), SendFilter::heartbeat(hb.visibility.clone()));
    let sink = HarnessSink::new(Arc::clone(runtime), session_id.clone(), channel);
    let user_message = heartbeat_message(&load_checklist(runtime));

    let _ = runtime
        .execute_turn_with_engine(&mut session, user_message, sink, hb.model.as_deref())
        .await;

    runtime.take_send_filter(&session_id);
}

fn load_checklist(runtime: &AgentRuntime) -> String {
    let path = runtime.agent_root.join("workspace").join("HEARTBEAT.md");
    std::fs::read_to_string(path).unwrap_or_default()
}

/// cron: `main` mode behaves like a user turn sharing the busy gate;
/// `isolated` mode runs in a throwaway session and delivers the captured
/// output per `delivery`.
async fn handle_cron(runtime: &Arc<AgentRuntime>, job: CronJobRow) {
    match job.config.execution {
        ExecutionMode::Main => handle_cron_main(runtime, &job.config).await,
        ExecutionMode::Isolated => handle_cron_isolated(runtime, &job).await,
    }
}

async fn handle_cron_main(runtime: &Arc<AgentRuntime>, config: &CronJobConfig) {
    let Some(handle) = resolve_target(runtime, &config.target).await else {
        warn!(job_id = %config.id, target = %config.target, "cron target not resolvable, skipping");
        return;
    };
    let Ok(mut session) = handle.try_lock() else {
        info!(job_id = %config.id, "cron job skipped: target session busy");
        return;
    };

    let channel = session.channel.clone();
    let session_id = channel.session_id();

    let sink = HarnessSink::new(Arc::clone(runtime), session_id, channel);
    let user_message = cireilclaw_core::Message::user_text(config.prompt.clone());

    let _ = runtime
        .execute_turn_with_engine(&mut session, user_message, sink, config.model.as_deref())
        .await;
}

async fn handle_cron_isolated(runtime: &Arc<AgentRuntime>, job: &CronJobRow) {
    let config = &job.config;
    let channel = Channel::Internal {
        job_id: config.id.clone(),
    };
    let session_id = channel.session_id();
    let mut session = Session::new(channel.clone(), chrono::Utc::now().timestamp_millis());

    runtime.install_send_filter(session_id.clone(), SendFilter::capture_all());
    let sink = HarnessSink::new(Arc::clone(runtime), session_id.clone(), channel);
    let user_message = cireilclaw_core::Message::user_text(config.prompt.clone());

    let result = runtime
        .execute_turn_with_engine(&mut session, user_message, sink, config.model.as_deref())
        .await;
    let captured = runtime
        .take_send_filter(&session_id)
        .and_then(SendFilter::into_captured)
        .unwrap_or_default();

    if let Err(e) = result {
        warn!(job_id = %config.id, error = %e, "cron (isolated) turn failed");
        return;
    }
    if captured.is_empty() {
        return;
    }

    match config.delivery {
        DeliveryMode::Announce => deliver_announce(runtime, &config.target, &captured).await,
        DeliveryMode::Webhook => deliver_webhook(runtime, config, &captured).await,
        DeliveryMode::None => {}
    }
}

async fn deliver_announce(runtime: &Arc<AgentRuntime>, target: &str, content: &str) {
    let Some(handle) = resolve_target(runtime, target).await else {
        warn!(target, "cron announce target not resolvable, dropping output");
        return;
    };
    let session = handle.lock().await;
    let channel = session.channel.clone();
    let session_id = channel.session_id();
    drop(session);
    runtime.dispatch_send(&session_id, &channel, content).await;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(rename = "agentSlug")]
    agent_slug: &'a str,
    #[serde(rename = "jobId")]
    job_id: &'a str,
    content: &'a str,
}

async fn deliver_webhook(runtime: &Arc<AgentRuntime>, config: &CronJobConfig, content: &str) {
    let Some(url) = config.webhook_url.as_deref() else {
        warn!(job_id = %config.id, "webhook delivery configured with no webhookUrl, dropping output");
        return;
    };
    let payload = WebhookPayload {
        agent_slug: runtime.slug.as_str(),
        job_id: &config.id,
        content,
    };
    if let Err(e) = runtime.http.post(url).json(&payload).send().await {
        warn!(job_id = %config.id, error = %e, "cron webhook delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_uses_camel_case_field_names() {
        let payload = WebhookPayload {
            agent_slug: "main",
            job_id: "job-1",
            content: "done",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["agentSlug"], "main");
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["content"], "done");
    }
}
