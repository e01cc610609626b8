/// Errors that abort a turn outright, as opposed to validation errors that a
/// tool turns into a model-visible output ("tools never throw to the
/// turn engine for input-validation errors").
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] crate::provider::ProviderError),

    #[error("provider response content was filtered")]
    ContentFiltered,

    #[error("provider finished with unexpected reason: {0}")]
    UnexpectedFinish(String),

    #[error("turn exceeded the iteration cap")]
    IterationCapExceeded,

    #[error("malformed tool-call arguments: {0}")]
    MalformedToolCall(String),

    #[error("session error: {0}")]
    Session(#[from] cireilclaw_sessions::SessionError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
