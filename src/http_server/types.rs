//! Request and response types of the control API.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Session, SessionId, SessionRole, SessionStatus};

/// JSON status code plus body, produced by every handler
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, body)
    }

    pub fn error(status: u16, error: &str) -> Self {
        Self::new(status, serde_json::json!({ "error": error }))
    }

    pub fn error_with_message(status: u16, error: &str, message: impl Into<String>) -> Self {
        Self::new(
            status,
            serde_json::json!({ "error": error, "message": message.into() }),
        )
    }

    pub fn from_serializable<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self::new(status, body),
            Err(_) => Self::error(500, "serialize"),
        }
    }
}

impl From<crate::ConductorError> for ApiResponse {
    fn from(err: crate::ConductorError) -> Self {
        ApiResponse::error_with_message(err.status_code(), err.code(), err.to_string())
    }
}

/// `POST /sessions`
///
/// Fields are optional at the schema level so that a missing field is a
/// validation error (400) rather than a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub name: Option<String>,
    pub directory: Option<String>,
    pub mcp_port: Option<u16>,
    /// "conductor" or "worker"; anything else folds to worker
    pub role: Option<String>,
    /// Sent to the agent once its process has started
    pub initial_prompt: Option<String>,
}

/// `POST /sessions/{id}/send` and `POST /broadcast`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageRequest {
    pub message: Option<String>,
}

/// One entry of `GET /sessions`
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub directory: PathBuf,
    pub mcp_port: u16,
    pub role: SessionRole,
    pub status: SessionStatus,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            directory: session.directory.clone(),
            mcp_port: session.mcp_port,
            role: session.role,
            status: session.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

/// 201 body of `POST /sessions`
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub id: SessionId,
    pub name: String,
    pub directory: PathBuf,
    pub mcp_port: u16,
    pub role: SessionRole,
    /// Always "created"
    pub status: &'static str,
    /// Lifecycle status right after creation (working, or error on spawn failure)
    pub session_status: SessionStatus,
}

impl From<&Session> for CreateSessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            directory: session.directory.clone(),
            mcp_port: session.mcp_port,
            role: session.role,
            status: "created",
            session_status: session.status,
        }
    }
}
