use thiserror::Error;

use crate::application::api::ApiError;
use crate::domain::error::ValidationError;
use crate::infra::error::InfraError;

/// Failure surfaced by the engine to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("not signed in or not allowed")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("conflicting change: {0}")]
    Conflict(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("server failure: {0}")]
    Server(String),
}

impl EngineError {
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(error)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Network(_) | EngineError::Server(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Unauthorized => "unauthorized",
            EngineError::NotFound => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Network(_) => "network",
            EngineError::Server(_) => "server",
        }
    }
}

impl From<ApiError> for EngineError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Status { status, body } => match status {
                400 | 422 => EngineError::Validation(ValidationError::Rejected(body)),
                401 | 403 => EngineError::Unauthorized,
                404 => EngineError::NotFound,
                409 | 412 => EngineError::conflict(body),
                _ => EngineError::server(format!("status {status} body {body}")),
            },
            ApiError::Transport(message)
            | ApiError::Decode(message)
            | ApiError::InvalidUrl(message) => EngineError::network(message),
        }
    }
}

/// Top-level error of the command-line binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
