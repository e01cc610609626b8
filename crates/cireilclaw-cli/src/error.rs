/// Top-level harness errors (`Fatal`): a single agent failing to
/// initialize is logged and the agent is skipped, not a process abort,
/// so most of these are handled at the call site rather than propagated
/// all the way to `main`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] cireilclaw_core::ConfigError),

    #[error("session store error: {0}")]
    Session(#[from] cireilclaw_sessions::SessionError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] cireilclaw_scheduler::SchedulerError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("no agents found under {0}")]
    NoAgents(String),

    #[error("unknown agent slug: {0}")]
    UnknownAgent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
