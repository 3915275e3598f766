use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique session identifier, stable for the lifetime of the controller
pub type SessionId = u64;

/// Role tag of a session
///
/// Conductor sessions are never implicit broadcast targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Conductor,
    #[default]
    Worker,
}

impl SessionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Conductor => "conductor",
            SessionRole::Worker => "worker",
        }
    }

    /// Parse a role from request input. Anything unrecognized folds to `Worker`.
    pub fn from_lenient(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("conductor") => SessionRole::Conductor,
            _ => SessionRole::Worker,
        }
    }
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No live process, none has been started since boot
    #[default]
    Idle,
    /// Process is running and producing a turn
    Working,
    /// Process is showing its input prompt
    WaitingForInput,
    /// Spawn or I/O fault
    Error,
    /// A process existed and died
    Disconnected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Working => "working",
            SessionStatus::WaitingForInput => "waiting_for_input",
            SessionStatus::Error => "error",
            SessionStatus::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A managed interactive agent session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    /// Working directory the agent process runs in
    pub directory: PathBuf,
    /// Auxiliary port handed to the child through its environment
    pub mcp_port: u16,
    pub role: SessionRole,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Message of the most recent spawn or I/O fault
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(
        id: SessionId,
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        mcp_port: u16,
        role: SessionRole,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            directory: directory.into(),
            mcp_port,
            role,
            status: SessionStatus::Idle,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn is_worker(&self) -> bool {
        self.role == SessionRole::Worker
    }

    /// Update the status, clearing `last_error` unless the new status is `Error`
    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        if status != SessionStatus::Error {
            self.last_error = None;
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.last_error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_folds_unknown_to_worker() {
        assert_eq!(SessionRole::from_lenient(Some("conductor")), SessionRole::Conductor);
        assert_eq!(SessionRole::from_lenient(Some(" Conductor ")), SessionRole::Conductor);
        assert_eq!(SessionRole::from_lenient(Some("worker")), SessionRole::Worker);
        assert_eq!(SessionRole::from_lenient(Some("boss")), SessionRole::Worker);
        assert_eq!(SessionRole::from_lenient(None), SessionRole::Worker);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::WaitingForInput).unwrap();
        assert_eq!(json, "\"waiting_for_input\"");
        assert_eq!(SessionStatus::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn test_set_status_clears_error() {
        let mut session = Session::new(1, "w", "/tmp", 55558, SessionRole::Worker);
        session.set_error("spawn failed");
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.last_error.is_some());

        session.set_status(SessionStatus::Working);
        assert!(session.last_error.is_none());
    }
}
