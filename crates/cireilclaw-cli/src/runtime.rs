//! Per-agent runtime state: everything a turn, a scheduler tick, or
//! an inbound channel message needs to act on one agent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cireilclaw_core::config::{
    AgentConfigBundle, EngineConfig, HeartbeatConfig, IntegrationsConfig, ToolsConfig,
};
use cireilclaw_core::{AgentSlug, Channel, Message, SessionId};
use cireilclaw_agent::tools::Tool;
use cireilclaw_agent::turn::TurnDeps;
use cireilclaw_channels::{ChannelManager, OutboundMessage};
use cireilclaw_scheduler::SchedulerHandle;
use cireilclaw_sessions::{Session, SessionStore};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::warn;

use crate::send_filter::SendFilter;

/// Process-wide handle to one loaded agent. Held behind an `Arc` so scheduler
/// tasks, channel adapters, and the inbound sink can all share it.
pub struct AgentRuntime {
    pub slug: AgentSlug,
    pub agent_root: PathBuf,
    pub engine: RwLock<EngineConfig>,
    pub tools_config: ToolsConfig,
    pub tools: Vec<Box<dyn Tool>>,
    pub integrations: IntegrationsConfig,
    pub http: reqwest::Client,
    pub store: Arc<SessionStore>,
    pub scheduler: Arc<SchedulerHandle>,
    pub heartbeat: HeartbeatConfig,
    sessions: std::sync::Mutex<HashMap<SessionId, Arc<AsyncMutex<Session>>>>,
    send_filters: std::sync::Mutex<HashMap<SessionId, SendFilter>>,
    pub channels: ChannelManager,
}

impl AgentRuntime {
    pub fn new(
        slug: AgentSlug,
        agent_root: PathBuf,
        config: &AgentConfigBundle,
        integrations: IntegrationsConfig,
        store: Arc<SessionStore>,
        scheduler: Arc<SchedulerHandle>,
        channels: ChannelManager,
    ) -> Self {
        Self {
            slug,
            agent_root,
            engine: RwLock::new(config.engine.clone()),
            tools_config: config.tools.clone(),
            tools: cireilclaw_agent::tools::standard_tools(&config.tools),
            integrations,
            http: reqwest::Client::new(),
            store,
            scheduler,
            heartbeat: config.heartbeat.clone(),
            sessions: std::sync::Mutex::new(HashMap::new()),
            send_filters: std::sync::Mutex::new(HashMap::new()),
            channels,
        }
    }

    /// Returns the (possibly shared) in-memory session for `channel`,
    /// creating and rehydrating it from storage on first use.
    pub fn session_handle(&self, channel: &Channel) -> Arc<AsyncMutex<Session>> {
        let id = channel.session_id();
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(existing) = sessions.get(&id) {
            return Arc::clone(existing);
        }

        let session = match self.store.load(&id) {
            Ok(Some(row)) => match self.store.rehydrate_session(&row, now_epoch_ms()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(agent = %self.slug, error = %e, "failed to rehydrate session, starting fresh");
                    Session::new(channel.clone(), now_epoch_ms())
                }
            },
            Ok(None) => Session::new(channel.clone(), now_epoch_ms()),
            Err(e) => {
                warn!(agent = %self.slug, error = %e, "session lookup failed, starting fresh");
                Session::new(channel.clone(), now_epoch_ms())
            }
        };

        let handle = Arc::new(AsyncMutex::new(session));
        sessions.insert(id, Arc::clone(&handle));
        handle
    }

    /// Rehydrates every persisted session into the in-memory map at startup,
    /// so `"last"`/exact-id scheduler targets and a resumed chat both see
    /// real history rather than an empty stand-in.
    pub fn preload_session_ids(&self) -> crate::error::Result<()> {
        for id in self.store.list_ids()? {
            if self.sessions.lock().unwrap().contains_key(&id) {
                continue;
            }
            let row = match self.store.load(&id) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(e) => {
                    warn!(agent = %self.slug, session = %id, error = %e, "session lookup failed during preload, skipping");
                    continue;
                }
            };
            match self.store.rehydrate_session(&row, now_epoch_ms()) {
                Ok(session) => {
                    self.sessions
                        .lock()
                        .unwrap()
                        .insert(id, Arc::new(AsyncMutex::new(session)));
                }
                Err(e) => {
                    warn!(agent = %self.slug, session = %id, error = %e, "failed to rehydrate persisted session, skipping");
                }
            }
        }
        Ok(())
    }

    /// Finds the session with the greatest `lastActivity` across every
    /// session currently held in memory (heartbeat target `"last"`).
    pub async fn last_active_session(&self) -> Option<Arc<AsyncMutex<Session>>> {
        let handles: Vec<Arc<AsyncMutex<Session>>> = {
            let sessions = self.sessions.lock().unwrap();
            sessions.values().cloned().collect()
        };
        let mut best: Option<(i64, Arc<AsyncMutex<Session>>)> = None;
        for handle in handles {
            let epoch = handle.lock().await.last_activity_epoch_ms;
            let should_replace = match &best {
                Some((e, _)) => epoch > *e,
                None => true,
            };
            if should_replace {
                best = Some((epoch, handle));
            }
        }
        best.map(|(_, h)| h)
    }

    pub fn session_by_id(&self, id: &SessionId) -> Option<Arc<AsyncMutex<Session>>> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    /// Persists `session` (debounced) back to the store.
    pub fn save(&self, session: &Session) {
        self.store.save_session(session.clone());
    }

    /// Immediately flushes every in-memory session to disk, cancelling any
    /// pending debounce timers. Called once, at shutdown.
    pub async fn flush_all_sessions(&self) {
        let handles: Vec<Arc<AsyncMutex<Session>>> = {
            let sessions = self.sessions.lock().unwrap();
            sessions.values().cloned().collect()
        };
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.lock().await.clone());
        }
        if let Err(e) = self.store.flush_all(&snapshots) {
            warn!(agent = %self.slug, error = %e, "failed to flush sessions on shutdown");
        }
    }

    /// Takes a snapshot of the live `EngineConfig` for a single turn — each
    /// turn holds its own copy so a concurrent hot-reload can't change the
    /// model or API base out from under it mid-turn.
    pub async fn engine_snapshot(&self) -> EngineConfig {
        self.engine.read().await.clone()
    }

    /// Swaps in a freshly-parsed `EngineConfig`, e.g. from the config
    /// hot-reload watcher.
    pub async fn reload_engine(&self, new_engine: EngineConfig) {
        *self.engine.write().await = new_engine;
    }

    pub fn install_send_filter(&self, id: SessionId, filter: SendFilter) {
        self.send_filters.lock().unwrap().insert(id, filter);
    }

    pub fn take_send_filter(&self, id: &SessionId) -> Option<SendFilter> {
        self.send_filters.lock().unwrap().remove(id)
    }

    /// Called by [`HarnessSink`] for every `respond`/heartbeat send. Consults
    /// (and may mutate) this session's transient filter; forwards to the
    /// registered channel adapter unless suppressed or captured.
    pub async fn dispatch_send(&self, id: &SessionId, channel: &Channel, content: &str) {
        let forward = {
            let mut filters = self.send_filters.lock().unwrap();
            match filters.get_mut(id) {
                Some(filter) => filter.intercept(content),
                None => true,
            }
        };
        if forward {
            self.forward(channel, content).await;
        }
    }

    /// A send that bypasses any installed filter — used by the scheduler for
    /// cron `main` mode, which has no `SendFilter` of its own and behaves
    /// like an ordinary user turn.
    async fn forward(&self, channel: &Channel, content: &str) {
        let Some(adapter) = self.channels.get(channel.kind()) else {
            return;
        };
        let msg = OutboundMessage {
            channel: channel.clone(),
            content: content.to_string(),
            format: cireilclaw_channels::MessageFormat::Markdown,
        };
        // Transient I/O errors are logged and swallowed rather than failing
        // the turn — the response was already generated either way.
        if let Err(e) = adapter.send(&msg).await {
            warn!(channel = channel.kind(), error = %e, "channel send failed");
        }
    }

    pub fn turn_deps(
        self: &Arc<Self>,
        engine: EngineConfig,
        sink: Arc<dyn cireilclaw_agent::tools::TurnSink>,
    ) -> TurnDeps<'_> {
        TurnDeps {
            agent_root: self.agent_root.clone(),
            agent_slug: self.slug.as_str().to_string(),
            engine,
            tools: &self.tools,
            tools_config: &self.tools_config,
            integrations: &self.integrations,
            scheduler: Some(&self.scheduler),
            sink: Some(sink),
            http: self.http.clone(),
        }
    }

    /// Appends `user_message` to `session`'s history and runs one turn
    /// against it, rolling the history back to its pre-turn length on
    /// failure (`ProviderError`) and persisting either way. Shared by
    /// the inbound sink and the scheduler runner — the only difference
    /// between a live chat message, a heartbeat tick, and a cron firing is
    /// what `user_message` carries and which model override applies.
    pub async fn execute_turn(
        self: &Arc<Self>,
        session: &mut Session,
        user_message: Message,
        sink: Arc<dyn cireilclaw_agent::tools::TurnSink>,
    ) -> cireilclaw_agent::Result<()> {
        self.execute_turn_with_engine(session, user_message, sink, None).await
    }

    /// As [`Self::execute_turn`], but with an optional per-call model
    /// override layered onto the snapshotted engine config (heartbeat
    /// and cron jobs may each pin their own model).
    pub async fn execute_turn_with_engine(
        self: &Arc<Self>,
        session: &mut Session,
        user_message: Message,
        sink: Arc<dyn cireilclaw_agent::tools::TurnSink>,
        model_override: Option<&str>,
    ) -> cireilclaw_agent::Result<()> {
        let history_len_before = session.history.len();
        session.history.push(user_message);
        session.last_activity_epoch_ms = now_epoch_ms();

        let mut engine = self.engine_snapshot().await;
        if let Some(model) = model_override {
            engine.model = model.to_string();
        }
        let deps = self.turn_deps(engine, sink);

        let result = cireilclaw_agent::run_turn(session, &deps).await;
        if let Err(ref e) = result {
            warn!(agent = %self.slug, error = %e, "turn failed, rolling back history");
            session.history.truncate(history_len_before);
        }
        self.save(session);
        result
    }
}

fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Builds the synthetic `[HEARTBEAT] ...` user message sent as the turn's
/// user content.
pub fn heartbeat_message(checklist: &str) -> Message {
    Message::user_text(format!("[HEARTBEAT] Evaluate your heartbeat checklist.\n\n{checklist}"))
}
