use memento_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("store error: {0}")]
    Store(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("project not found: {0}")]
    ProjectNotFound(uuid::Uuid),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("background task has stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
