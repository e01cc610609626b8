use thiserror::Error;

/// Config-loading failures. Aborts startup for global/agent config; a single
/// malformed persisted cron job is logged and skipped by the scheduler
/// instead of propagating one of these (see error taxonomy).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("missing required config file: {0}")]
    Missing(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
