/// Errors produced by the Matrix adapter.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    #[error("matrix-sdk error: {0}")]
    Sdk(#[from] matrix_sdk::Error),

    #[error("invalid homeserver url: {0}")]
    InvalidHomeserver(#[from] url::ParseError),

    #[error("client not logged in")]
    NotLoggedIn,

    #[error("not joined to room {0}")]
    RoomNotJoined(String),
}
