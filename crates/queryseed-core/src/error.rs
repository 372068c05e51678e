use thiserror::Error;

/// Core error type shared across queryseed crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error or adapter failure.
    #[error("database error: {0}")]
    Db(String),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Two or more tables reference each other and cannot be ordered.
    #[error("dependency cycle between tables: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
    /// A requested feature is not supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by queryseed crates.
pub type Result<T> = std::result::Result<T, Error>;
