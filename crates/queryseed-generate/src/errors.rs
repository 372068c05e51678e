use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("foreign key cycle between tables: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("generation cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<queryseed_core::Error> for GenerationError {
    fn from(error: queryseed_core::Error) -> Self {
        match error {
            queryseed_core::Error::DependencyCycle(tables) => GenerationError::DependencyCycle(tables),
            other => GenerationError::Schema(other.to_string()),
        }
    }
}
