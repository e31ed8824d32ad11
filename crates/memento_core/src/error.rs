use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Photo not found: {0}")]
    PhotoNotFound(uuid::Uuid),

    #[error("Transition not found: {0}")]
    TransitionNotFound(uuid::Uuid),

    #[error("Index {index} out of range (timeline has {len} slots)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Timeline invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
