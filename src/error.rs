//! Error taxonomy for the orchestration core.

use crate::SessionId;

/// Errors raised by the conductor core.
///
/// Each variant is absorbed at the boundary that can act on it: the control
/// API maps `Validation`/`NotFound` to HTTP responses, the supervisor folds
/// `Spawn`/`Io` into session status, and persistence failures are logged.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    #[error("{0}")]
    Validation(String),

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("failed to spawn session {id}: {reason}")]
    Spawn { id: SessionId, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Persistence(String),
}

impl ConductorError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConductorError::Validation(message.into())
    }

    /// HTTP status code the control API answers with
    pub fn status_code(&self) -> u16 {
        match self {
            ConductorError::Validation(_) => 400,
            ConductorError::NotFound(_) => 404,
            ConductorError::Spawn { .. }
            | ConductorError::Io(_)
            | ConductorError::Persistence(_) => 500,
        }
    }

    /// Machine-readable error code for JSON responses
    pub fn code(&self) -> &'static str {
        match self {
            ConductorError::Validation(_) => "validation_error",
            ConductorError::NotFound(_) => "not_found",
            ConductorError::Spawn { .. } => "spawn_failed",
            ConductorError::Io(_) => "io_error",
            ConductorError::Persistence(_) => "persistence_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConductorError>;
