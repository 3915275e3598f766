//! Process handle abstraction.
//!
//! A handle owns one child bound to a duplex byte stream. Output and exit are
//! never reported through callbacks into shared state: the spawner's worker
//! threads push [`ProcessEvent`]s onto a channel that the coordinating owner
//! drains.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use crate::error::Result;
use crate::SessionId;

/// Everything needed to launch one agent process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub session_id: SessionId,
    /// Incremented on every spawn; events carry it so stale ones can be dropped
    pub generation: u64,
    pub directory: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub rows: u16,
    pub cols: u16,
}

/// Emitted by per-process worker threads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output {
        session_id: SessionId,
        generation: u64,
        data: String,
    },
    Exited {
        session_id: SessionId,
        generation: u64,
        exit_code: Option<u32>,
    },
}

impl ProcessEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ProcessEvent::Output { session_id, .. } | ProcessEvent::Exited { session_id, .. } => {
                *session_id
            }
        }
    }
}

pub type EventSink = Sender<ProcessEvent>;

/// A live child process
pub trait ProcessHandle: Send {
    /// Write raw bytes to the process input
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Terminate the process and stop its read loop. Safe to call twice.
    fn kill(&mut self);

    fn is_alive(&self) -> bool;

    fn pid(&self) -> Option<u32>;
}

/// Launches processes for the supervisor
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, spec: &LaunchSpec, events: EventSink) -> Result<Box<dyn ProcessHandle>>;
}
