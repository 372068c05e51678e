use std::fmt;

use thiserror::Error;

/// One completion call against a specific model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Failure classes decided by the service adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionErrorKind {
    /// Daily quota used up on the provider side.
    QuotaExhausted,
    RateLimited,
    Timeout,
    Unauthorized,
    Network,
    InvalidResponse,
}

impl CompletionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionErrorKind::QuotaExhausted => "quota_exhausted",
            CompletionErrorKind::RateLimited => "rate_limited",
            CompletionErrorKind::Timeout => "timeout",
            CompletionErrorKind::Unauthorized => "unauthorized",
            CompletionErrorKind::Network => "network",
            CompletionErrorKind::InvalidResponse => "invalid_response",
        }
    }

    /// Transient failures back off the endpoint instead of failing it.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            CompletionErrorKind::RateLimited
                | CompletionErrorKind::Timeout
                | CompletionErrorKind::InvalidResponse
        )
    }
}

impl fmt::Display for CompletionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn new(kind: CompletionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// External text-generation service.
///
/// Implementations must bound every call with their own timeout and
/// report it as [`CompletionErrorKind::Timeout`].
pub trait TextCompletion: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
