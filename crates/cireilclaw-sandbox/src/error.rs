//! Error types for the sandbox crate.

use thiserror::Error;

/// Path resolver failure. Surfaced to tools as a structured `AccessDenied`
/// error; the message is sanitized so the real agent-root prefix never
/// leaks — see `resolver::sanitize`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AccessDenied(pub String);

/// Sandbox executor failures (`SandboxError`).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Command '{0}' is not in the allowed binaries list.")]
    NotAllowed(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("blocked: {0}")]
    Denylisted(String),

    #[error("failed to build sandbox: {0}")]
    JailBuildFailed(String),

    #[error("failed to spawn sandboxed process: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
