use thiserror::Error;

/// Errors that can occur during session store operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {id}")]
    NotFound { id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt persisted session row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
