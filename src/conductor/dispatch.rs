//! Dispatch engine: prompts into session input streams, recorded in history.

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Conductor, ConductorState};
use crate::agent::WriteOutcome;
use crate::error::{ConductorError, Result};
use crate::{DispatchTask, SessionId, SessionStatus};

/// Outcome of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub task_id: Uuid,
    pub session_id: SessionId,
    /// Whether the prompt reached a live process
    pub delivered: bool,
}

impl ConductorState {
    /// Record `task` and write its prompt plus the line terminator to the target.
    ///
    /// Delivery marks the session `Working`; a write against a dead stream
    /// marks it `Disconnected`. Neither case is an error for the caller.
    pub(crate) fn dispatch_task(&mut self, task: DispatchTask) -> DispatchReceipt {
        let session_id = task.target_session_id;
        let payload = format!("{}{}", task.prompt, self.supervisor.line_terminator());
        let task_id = task.id;
        self.registry.record_task(task);

        let outcome = self.supervisor.write(session_id, payload.as_bytes());
        match outcome {
            WriteOutcome::Delivered => {
                self.registry.set_status(session_id, SessionStatus::Working);
            }
            WriteOutcome::Failed => {
                self.registry
                    .set_status(session_id, SessionStatus::Disconnected);
            }
            WriteOutcome::NoProcess => {}
        }

        debug!(
            "[conductor:dispatch] Task {} -> session {}: {:?}",
            task_id, session_id, outcome
        );

        DispatchReceipt {
            task_id,
            session_id,
            delivered: outcome == WriteOutcome::Delivered,
        }
    }

    /// One independent dispatch per worker session, in registry order.
    /// Conductor-role sessions are skipped.
    pub(crate) fn dispatch_to_all(&mut self, prompt: &str) -> Vec<DispatchReceipt> {
        self.registry
            .worker_ids()
            .into_iter()
            .map(|id| self.dispatch_task(DispatchTask::new(id, prompt)))
            .collect()
    }
}

fn require_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(ConductorError::validation("message is required"));
    }
    Ok(())
}

impl Conductor {
    /// Send a message to one session
    pub fn send(&self, id: SessionId, message: &str) -> Result<DispatchReceipt> {
        require_message(message)?;

        let mut state = self.lock();
        if !state.registry.contains(id) {
            return Err(ConductorError::NotFound(id));
        }
        Ok(state.dispatch_task(DispatchTask::new(id, message)))
    }

    /// Send a message to every worker session
    pub fn broadcast(&self, message: &str) -> Result<Vec<DispatchReceipt>> {
        require_message(message)?;

        let receipts = self.lock().dispatch_to_all(message);
        info!(
            "[conductor:dispatch] Broadcast to {} worker(s), {} delivered",
            receipts.len(),
            receipts.iter().filter(|r| r.delivered).count()
        );
        Ok(receipts)
    }
}
