//! Process supervisor: one handle and one output buffer per session.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::env::launch_env;
use super::process::{EventSink, LaunchSpec, ProcessHandle, ProcessSpawner};
use crate::config::{AgentSettings, BufferSettings};
use crate::error::Result;
use crate::session::{is_awaiting_instruction, OutputBuffer};
use crate::{Session, SessionId};

/// Bytes of buffer tail the completion detector looks at
const DETECTOR_TAIL_BYTES: usize = 8 * 1024;

/// Result of writing to a session's process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Delivered,
    /// The session has no live handle; nothing was written
    NoProcess,
    /// The write hit a dead stream; the handle has been dropped
    Failed,
}

struct ManagedProcess {
    generation: u64,
    handle: Box<dyn ProcessHandle>,
}

/// Owns every process handle and output buffer, keyed by session id.
///
/// Not thread-safe on its own: the [`crate::Conductor`] keeps it behind the
/// same lock as the registry.
pub struct Supervisor {
    spawner: Arc<dyn ProcessSpawner>,
    events: EventSink,
    agent: AgentSettings,
    buffer_max_bytes: usize,
    processes: HashMap<SessionId, ManagedProcess>,
    buffers: HashMap<SessionId, OutputBuffer>,
    next_generation: u64,
}

impl Supervisor {
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        events: EventSink,
        agent: AgentSettings,
        buffer: &BufferSettings,
    ) -> Self {
        Self {
            spawner,
            events,
            agent,
            buffer_max_bytes: buffer.max_bytes,
            processes: HashMap::new(),
            buffers: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn line_terminator(&self) -> &str {
        &self.agent.line_terminator
    }

    fn launch_spec(&mut self, session: &Session) -> LaunchSpec {
        let generation = self.next_generation;
        self.next_generation += 1;

        let mut args = self.agent.shell_args.clone();
        args.push(self.agent.command.clone());

        LaunchSpec {
            session_id: session.id,
            generation,
            directory: session.directory.clone(),
            program: self.agent.shell.clone(),
            args,
            env: launch_env(&self.agent.port_env_var, session.mcp_port),
            rows: self.agent.rows,
            cols: self.agent.cols,
        }
    }

    /// Spawn the session's process, tearing down any previous one first.
    ///
    /// The output buffer is replaced with an empty one.
    pub fn start(&mut self, session: &Session) -> Result<()> {
        self.stop(session.id);

        let spec = self.launch_spec(session);
        self.buffers
            .insert(session.id, OutputBuffer::new(self.buffer_max_bytes));

        let handle = self.spawner.spawn(&spec, self.events.clone())?;
        info!(
            "[conductor:supervisor] Started session {} ({}) pid={:?}",
            session.id,
            session.name,
            handle.pid()
        );
        self.processes.insert(
            session.id,
            ManagedProcess {
                generation: spec.generation,
                handle,
            },
        );
        Ok(())
    }

    /// Write bytes to a session's process. Faults are logged, never returned.
    pub fn write(&mut self, id: SessionId, bytes: &[u8]) -> WriteOutcome {
        let Some(process) = self.processes.get_mut(&id) else {
            warn!("[conductor:supervisor] Write to session {} ignored: no process", id);
            return WriteOutcome::NoProcess;
        };

        match process.handle.write(bytes) {
            Ok(()) => WriteOutcome::Delivered,
            Err(e) => {
                warn!("[conductor:supervisor] Write to session {} failed: {}", id, e);
                self.stop(id);
                WriteOutcome::Failed
            }
        }
    }

    /// Kill the session's process and release its stream. Returns whether a
    /// handle existed.
    pub fn stop(&mut self, id: SessionId) -> bool {
        match self.processes.remove(&id) {
            Some(mut process) => {
                process.handle.kill();
                debug!(
                    "[conductor:supervisor] Stopped session {} (generation {})",
                    id, process.generation
                );
                true
            }
            None => false,
        }
    }

    /// Stop the process and drop the output buffer
    pub fn remove(&mut self, id: SessionId) {
        self.stop(id);
        self.buffers.remove(&id);
    }

    pub fn stop_all(&mut self) {
        let ids: Vec<SessionId> = self.processes.keys().copied().collect();
        for id in ids {
            self.stop(id);
        }
    }

    pub fn has_handle(&self, id: SessionId) -> bool {
        self.processes.contains_key(&id)
    }

    pub fn is_alive(&self, id: SessionId) -> bool {
        self.processes
            .get(&id)
            .is_some_and(|p| p.handle.is_alive())
    }

    pub fn handle_count(&self) -> usize {
        self.processes.len()
    }

    fn is_current(&self, id: SessionId, generation: u64) -> bool {
        self.processes
            .get(&id)
            .is_some_and(|p| p.generation == generation)
    }

    /// Append output from the current process generation.
    ///
    /// Returns the detector verdict over the buffer tail, or `None` when the
    /// event came from a replaced or stopped process.
    pub fn on_output(&mut self, id: SessionId, generation: u64, data: &str) -> Option<bool> {
        if !self.is_current(id, generation) {
            return None;
        }
        let max_bytes = self.buffer_max_bytes;
        let buffer = self
            .buffers
            .entry(id)
            .or_insert_with(|| OutputBuffer::new(max_bytes));
        buffer.append(data);
        Some(is_awaiting_instruction(buffer.tail_bytes(DETECTOR_TAIL_BYTES)))
    }

    /// Handle an exit of the current process generation by dropping its
    /// handle. Returns false for stale generations.
    pub fn on_exit(&mut self, id: SessionId, generation: u64) -> bool {
        if !self.is_current(id, generation) {
            return false;
        }
        self.processes.remove(&id);
        true
    }

    /// The last `lines` lines of a session's output (empty when nothing was captured)
    pub fn output_tail(&self, id: SessionId, lines: usize) -> String {
        self.buffers
            .get(&id)
            .map(|b| b.tail_lines(lines))
            .unwrap_or_default()
    }

    /// Whether the session's buffered output currently ends at its prompt
    pub fn awaiting_instruction(&self, id: SessionId) -> bool {
        self.buffers
            .get(&id)
            .is_some_and(|b| is_awaiting_instruction(b.tail_bytes(DETECTOR_TAIL_BYTES)))
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}
