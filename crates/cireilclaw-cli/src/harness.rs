//! The process-wide harness: loads every agent under `{root}/agents/`,
//! starts their channel transports and schedulers, and tears them all down
//! together on shutdown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cireilclaw_core::config::{self, load_agent_config, load_integrations, IntegrationsConfig};
use cireilclaw_core::AgentSlug;
use cireilclaw_channels::ChannelManager;
use cireilclaw_discord::{DiscordAdapter, DiscordSender};
use cireilclaw_matrix::{MatrixAdapter, MatrixSender};
use cireilclaw_scheduler::{SchedulerEngine, SchedulerHandle};
use cireilclaw_sessions::{db as sessions_db, SessionStore};
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{CliError, Result};
use crate::inbound::AgentInboundSink;
use crate::runtime::AgentRuntime;

/// How often the config hot-reload watcher checks `engine.toml`'s mtime.
const CONFIG_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

pub struct Harness {
    agents: HashMap<AgentSlug, Arc<AgentRuntime>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Harness {
    /// Loads every discoverable agent under `root`, starting its database,
    /// sessions, channel transports, and schedulers. An agent whose config
    /// fails to load is logged and skipped rather than aborting the whole
    /// process (`Fatal`).
    pub async fn start(root: &Path) -> Result<Self> {
        let slugs = config::discover_agents(root)?;
        if slugs.is_empty() {
            return Err(CliError::NoAgents(root.display().to_string()));
        }

        let integrations = load_integrations(root).unwrap_or_else(|e| {
            warn!(error = %e, "failed to load integrations.toml, using defaults");
            IntegrationsConfig::default()
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut agents = HashMap::new();
        let mut tasks = Vec::new();

        for slug in slugs {
            let agent_root = config::agent_root(root, &slug);
            match load_one_agent(&slug, &agent_root, &integrations, shutdown_rx.clone()).await {
                Ok((runtime, mut agent_tasks)) => {
                    tasks.append(&mut agent_tasks);
                    agents.insert(slug, runtime);
                }
                Err(e) => {
                    error!(agent = %slug, error = %e, "failed to load agent, skipping");
                }
            }
        }

        if agents.is_empty() {
            return Err(CliError::NoAgents(root.display().to_string()));
        }

        Ok(Self {
            agents,
            shutdown_tx,
            tasks,
        })
    }

    pub fn agent(&self, slug: &AgentSlug) -> Option<&Arc<AgentRuntime>> {
        self.agents.get(slug)
    }

    pub fn agent_slugs(&self) -> impl Iterator<Item = &AgentSlug> {
        self.agents.keys()
    }

    /// Two-stage shutdown: the caller raises this once for a
    /// graceful drain (schedulers stop, sessions flush) and a second time to
    /// force-exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        for (_, runtime) in self.agents {
            runtime.flush_all_sessions().await;
        }
        info!("harness shutdown complete");
    }
}

async fn load_one_agent(
    slug: &AgentSlug,
    agent_root: &Path,
    integrations: &IntegrationsConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(Arc<AgentRuntime>, Vec<JoinHandle<()>>)> {
    let bundle = load_agent_config(agent_root)?;

    let db_path = agent_root.join("sessions.db");
    let session_conn = Connection::open(&db_path)?;
    sessions_db::init_db(&session_conn)?;
    let store = Arc::new(SessionStore::new(session_conn, agent_root.to_path_buf()));

    let scheduler_conn = Connection::open(&db_path)?;
    let scheduler_handle = Arc::new(SchedulerHandle::new(scheduler_conn)?);
    for job in bundle.cron.jobs.clone() {
        if job.enabled {
            if let Err(e) = scheduler_handle.add_job(job.clone()) {
                warn!(agent = %slug, job_id = %job.id, error = %e, "failed to seed cron job");
            }
        }
    }

    let mut channels = ChannelManager::new();
    if let Some(discord_cfg) = &bundle.discord {
        let http = Arc::new(serenity::http::Http::new(&discord_cfg.bot_token));
        channels.register(Box::new(DiscordSender::new(http)));
    }
    if let Some(matrix_cfg) = &bundle.matrix {
        let store_path = agent_root.join("workspace").join("matrix_store");
        match cireilclaw_matrix::adapter::login(matrix_cfg, &store_path).await {
            Ok(client) => channels.register(Box::new(MatrixSender::new(client))),
            Err(e) => warn!(agent = %slug, error = %e, "matrix sender login failed"),
        }
    }
    channels.connect_all().await;

    let runtime = Arc::new(AgentRuntime::new(
        slug.clone(),
        agent_root.to_path_buf(),
        &bundle,
        integrations.clone(),
        store,
        scheduler_handle,
        channels,
    ));
    runtime.preload_session_ids()?;

    let mut tasks = Vec::new();

    if let Some(discord_cfg) = bundle.discord.clone() {
        let sink = AgentInboundSink::new(Arc::clone(&runtime));
        let adapter = DiscordAdapter::new(discord_cfg, sink);
        tasks.push(tokio::spawn(adapter.run(shutdown_rx.clone())));
    }
    if let Some(matrix_cfg) = bundle.matrix.clone() {
        let sink = AgentInboundSink::new(Arc::clone(&runtime));
        let adapter = MatrixAdapter::new(matrix_cfg, sink, agent_root);
        tasks.push(tokio::spawn(adapter.run(shutdown_rx.clone())));
    }

    let scheduler_db_conn = Connection::open(&db_path)?;
    let (fired_tx, fired_rx) = mpsc::channel(32);
    let heartbeat = bundle.heartbeat.clone();
    let scheduler_engine = SchedulerEngine::new(
        scheduler_db_conn,
        agent_root.to_path_buf(),
        Some(heartbeat),
        Some(fired_tx),
    )?;
    let engine_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(scheduler_engine.run(engine_shutdown)));

    let runner_runtime = Arc::clone(&runtime);
    let runner_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(crate::scheduler_runner::run(
        runner_runtime,
        fired_rx,
        runner_shutdown,
    )));

    let reload_runtime = Arc::clone(&runtime);
    let reload_path = agent_root.join("config").join("engine.toml");
    let mut reload_shutdown = shutdown_rx;
    tasks.push(tokio::spawn(async move {
        let mut last_modified = std::fs::metadata(&reload_path).and_then(|m| m.modified()).ok();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(CONFIG_POLL_INTERVAL) => {
                    let modified = std::fs::metadata(&reload_path).and_then(|m| m.modified()).ok();
                    if modified.is_some() && modified != last_modified {
                        last_modified = modified;
                        match std::fs::read_to_string(&reload_path)
                            .map_err(|e| e.to_string())
                            .and_then(|s| {
                                toml::from_str::<cireilclaw_core::config::EngineConfig>(&s)
                                    .map_err(|e| e.to_string())
                            })
                        {
                            Ok(engine) => {
                                info!(agent = %reload_runtime.slug, "engine config reloaded");
                                reload_runtime.reload_engine(engine).await;
                            }
                            Err(e) => warn!(agent = %reload_runtime.slug, error = %e, "engine config reload failed, keeping old config"),
                        }
                    }
                }
                _ = reload_shutdown.changed() => {
                    if *reload_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }));

    Ok((runtime, tasks))
}
