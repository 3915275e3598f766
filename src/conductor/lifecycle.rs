//! Session lifecycle: create, start, stop, remove and output reads.

use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{Conductor, ConductorState};
use crate::error::{ConductorError, Result};
use crate::session::strip_ansi_codes;
use crate::{DispatchTask, Session, SessionId, SessionRole, SessionStatus};

const GRACEFUL_EXIT_POLL: Duration = Duration::from_millis(50);

/// Validated input for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub directory: PathBuf,
    pub mcp_port: Option<u16>,
    pub role: SessionRole,
    /// Dispatched once the process is up; blank prompts are ignored
    pub initial_prompt: Option<String>,
}

impl NewSession {
    /// Validate name and directory. Both are required and must not be blank.
    pub fn new(name: Option<&str>, directory: Option<&str>) -> Result<Self> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let directory = directory.map(str::trim).filter(|d| !d.is_empty());

        match (name, directory) {
            (Some(name), Some(directory)) => Ok(Self {
                name: name.to_string(),
                directory: PathBuf::from(directory),
                mcp_port: None,
                role: SessionRole::Worker,
                initial_prompt: None,
            }),
            (None, _) => Err(ConductorError::validation("name is required")),
            (_, None) => Err(ConductorError::validation("directory is required")),
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.mcp_port = port;
        self
    }

    pub fn with_role(mut self, role: SessionRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_initial_prompt(mut self, prompt: Option<String>) -> Self {
        self.initial_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Tail of a session's output plus its status
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutput {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub output: String,
    pub awaiting_input: bool,
}

impl ConductorState {
    /// Start (or restart) a session's process and fold the outcome into its status
    pub(crate) fn start(&mut self, id: SessionId) -> Result<Session> {
        let session = self
            .registry
            .get(id)
            .cloned()
            .ok_or(ConductorError::NotFound(id))?;

        let result = self.supervisor.start(&session);
        let Some(entry) = self.registry.get_mut(id) else {
            return Err(ConductorError::NotFound(id));
        };
        match result {
            Ok(()) => entry.set_status(SessionStatus::Working),
            Err(e) => {
                warn!("[conductor] {}", e);
                entry.set_error(e.to_string());
            }
        }
        Ok(entry.clone())
    }

    fn output(&self, id: SessionId, lines: usize) -> Result<SessionOutput> {
        let session = self.registry.get(id).ok_or(ConductorError::NotFound(id))?;
        Ok(SessionOutput {
            id,
            name: session.name.clone(),
            status: session.status,
            output: strip_ansi_codes(&self.supervisor.output_tail(id, lines)),
            awaiting_input: self.supervisor.awaiting_instruction(id),
        })
    }
}

impl Conductor {
    /// Atomic copy of the session list
    pub fn list_sessions(&self) -> Vec<Session> {
        self.lock().registry.sessions().to_vec()
    }

    pub fn session(&self, id: SessionId) -> Result<Session> {
        self.lock()
            .registry
            .get(id)
            .cloned()
            .ok_or(ConductorError::NotFound(id))
    }

    pub fn session_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Add a session, persist the snapshot and, unless disabled, start its process.
    ///
    /// A spawn failure leaves the session in `Error`; the session still exists.
    /// The initial prompt, if any, is dispatched only when the start succeeded.
    pub fn create_session(&self, new: NewSession) -> Result<Session> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let id = state
            .registry
            .add(new.name, new.directory, new.mcp_port, new.role)?
            .id;
        self.persist(state);

        let session = if self.inner.agent.start_on_create {
            let session = state.start(id)?;
            match new.initial_prompt {
                Some(prompt) if session.status == SessionStatus::Working => {
                    let receipt = state.dispatch_task(DispatchTask::new(id, prompt));
                    info!(
                        "[conductor] Sent initial prompt to session {} (task {})",
                        id, receipt.task_id
                    );
                    state
                        .registry
                        .get(id)
                        .cloned()
                        .ok_or(ConductorError::NotFound(id))?
                }
                _ => session,
            }
        } else {
            state
                .registry
                .get(id)
                .cloned()
                .ok_or(ConductorError::NotFound(id))?
        };

        info!(
            "[conductor] Created session {} '{}' ({}) in {} [{}]",
            session.id,
            session.name,
            session.role,
            session.directory.display(),
            session.status
        );
        Ok(session)
    }

    /// Spawn the session's process, replacing any live one
    pub fn start_session(&self, id: SessionId) -> Result<Session> {
        self.lock().start(id)
    }

    /// Kill the session's process. The session stays registered as `Idle`.
    pub fn stop_session(&self, id: SessionId) -> Result<Session> {
        let mut guard = self.lock();
        let state = &mut *guard;

        if !state.registry.contains(id) {
            return Err(ConductorError::NotFound(id));
        }
        if state.supervisor.stop(id) {
            info!("[conductor] Stopped session {}", id);
        }
        let session = state
            .registry
            .get_mut(id)
            .ok_or(ConductorError::NotFound(id))?;
        session.set_status(SessionStatus::Idle);
        Ok(session.clone())
    }

    /// Terminate the session's process, then drop its buffer and registry entry.
    ///
    /// A live process is first asked to `/exit` and given `stop_grace_ms` to
    /// comply; the lock is not held while waiting.
    pub fn remove_session(&self, id: SessionId) -> Result<Session> {
        let mut grace = Duration::from_millis(self.inner.agent.stop_grace_ms);

        {
            let mut state = self.lock();
            if !state.registry.contains(id) {
                return Err(ConductorError::NotFound(id));
            }
            if !grace.is_zero() && state.supervisor.is_alive(id) {
                let exit = format!("/exit{}", state.supervisor.line_terminator());
                state.supervisor.write(id, exit.as_bytes());
            } else {
                grace = Duration::ZERO;
            }
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline && self.lock().supervisor.is_alive(id) {
            thread::sleep(GRACEFUL_EXIT_POLL);
        }

        let mut guard = self.lock();
        let state = &mut *guard;
        state.supervisor.remove(id);
        let removed = state
            .registry
            .remove(id)
            .ok_or(ConductorError::NotFound(id))?;
        self.persist(state);

        info!("[conductor] Deleted session {} '{}'", id, removed.name);
        Ok(removed)
    }

    /// Last `lines` lines of output (escape sequences stripped) plus status
    pub fn output(&self, id: SessionId, lines: Option<usize>) -> Result<SessionOutput> {
        let lines = lines.unwrap_or(self.inner.buffer.output_lines);
        self.lock().output(id, lines)
    }

    /// Output of every session, in registry order
    pub fn all_outputs(&self, lines: Option<usize>) -> Vec<SessionOutput> {
        let lines = lines.unwrap_or(self.inner.buffer.output_lines);
        let state = self.lock();
        state
            .registry
            .sessions()
            .iter()
            .filter_map(|s| state.output(s.id, lines).ok())
            .collect()
    }

    /// Dispatch history, optionally restricted to one target session
    pub fn tasks(&self, target: Option<SessionId>) -> Vec<DispatchTask> {
        let state = self.lock();
        match target {
            Some(id) => state.registry.tasks_for(id).into_iter().cloned().collect(),
            None => state.registry.tasks().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_requires_name_and_directory() {
        assert!(NewSession::new(Some("w"), Some("/tmp")).is_ok());

        let err = NewSession::new(Some("w"), None).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("directory"));

        let err = NewSession::new(Some("   "), Some("/tmp")).unwrap_err();
        assert!(err.to_string().contains("name"));

        assert!(NewSession::new(None, None).is_err());
    }

    #[test]
    fn test_new_session_trims_input() {
        let new = NewSession::new(Some("  ui-worker "), Some(" /tmp "))
            .unwrap()
            .with_role(SessionRole::Conductor)
            .with_port(Some(6000));
        assert_eq!(new.name, "ui-worker");
        assert_eq!(new.directory, PathBuf::from("/tmp"));
        assert_eq!(new.role, SessionRole::Conductor);
        assert_eq!(new.mcp_port, Some(6000));
        assert_eq!(new.initial_prompt, None);
    }

    #[test]
    fn test_blank_initial_prompt_is_dropped() {
        let new = NewSession::new(Some("w"), Some("/tmp"))
            .unwrap()
            .with_initial_prompt(Some("  \n".to_string()));
        assert_eq!(new.initial_prompt, None);

        let new = new.with_initial_prompt(Some("read the README".to_string()));
        assert_eq!(new.initial_prompt.as_deref(), Some("read the README"));
    }
}
