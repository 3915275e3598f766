//! PTY-backed process handles.
//!
//! Each spawned agent gets two helper threads: a reader forwarding decoded
//! output chunks, and a waiter observing exit. Neither touches shared state;
//! both only send [`ProcessEvent`]s.

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::process::{EventSink, LaunchSpec, ProcessEvent, ProcessHandle, ProcessSpawner};
use crate::error::{ConductorError, Result};

const READ_CHUNK: usize = 4096;
/// How long the waiter lets the reader drain after the child exits
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns agents inside a native pseudo-terminal
#[derive(Debug, Default, Clone)]
pub struct PtySpawner;

impl PtySpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for PtySpawner {
    fn spawn(&self, spec: &LaunchSpec, events: EventSink) -> Result<Box<dyn ProcessHandle>> {
        let id = spec.session_id;
        let spawn_err = |reason: String| ConductorError::Spawn { id, reason };

        if !spec.directory.is_dir() {
            return Err(spawn_err(format!(
                "working directory does not exist: {}",
                spec.directory.display()
            )));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&spec.directory);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(format!("failed to spawn {}: {e}", spec.program)))?;
        // Only the child keeps the slave side open, so the reader sees EOF when it exits
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(format!("failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(format!("failed to take PTY writer: {e}")))?;

        let killer = child.clone_killer();
        let pid = child.process_id();
        let alive = Arc::new(AtomicBool::new(true));
        let cancelled = Arc::new(AtomicBool::new(false));

        let generation = spec.generation;

        // Dropped when the reader finishes; the waiter blocks on it so that
        // every output chunk is queued ahead of the exit event.
        let (reader_done_tx, reader_done) = mpsc::channel::<()>();
        let reader_events = events.clone();
        let reader_cancelled = cancelled.clone();
        thread::Builder::new()
            .name(format!("session-{id}-reader"))
            .spawn(move || {
                read_loop(reader, id, generation, reader_events, reader_cancelled);
                drop(reader_done_tx);
            })
            .map_err(|e| spawn_err(format!("failed to start reader thread: {e}")))?;

        let waiter_alive = alive.clone();
        let waiter_cancelled = cancelled.clone();
        thread::Builder::new()
            .name(format!("session-{id}-waiter"))
            .spawn(move || {
                let exit_code = match child.wait() {
                    Ok(status) => Some(status.exit_code()),
                    Err(e) => {
                        warn!("[conductor:pty] Failed to wait for session {}: {}", id, e);
                        None
                    }
                };
                waiter_alive.store(false, Ordering::SeqCst);
                // A grandchild holding the slave open would keep the reader
                // going forever, so the drain wait is bounded.
                if let Err(RecvTimeoutError::Timeout) =
                    reader_done.recv_timeout(READER_DRAIN_TIMEOUT)
                {
                    debug!("[conductor:pty] Reader for session {} still open after exit", id);
                }
                if !waiter_cancelled.load(Ordering::SeqCst) {
                    let _ = events.send(ProcessEvent::Exited {
                        session_id: id,
                        generation,
                        exit_code,
                    });
                }
            })
            .map_err(|e| spawn_err(format!("failed to start waiter thread: {e}")))?;

        debug!(
            "[conductor:pty] Spawned session {} (generation {}, pid {:?}) in {}",
            id,
            generation,
            pid,
            spec.directory.display()
        );

        Ok(Box::new(PtyProcess {
            master: Some(pair.master),
            writer: Some(writer),
            killer,
            pid,
            alive,
            cancelled,
        }))
    }
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    session_id: crate::SessionId,
    generation: u64,
    events: EventSink,
    cancelled: Arc<AtomicBool>,
) {
    let mut buf = [0u8; READ_CHUNK];
    let mut carry = Vec::new();

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            // EIO once the child side is gone
            Err(_) => break,
        };
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        let data = decode_utf8_chunk(&mut carry, &buf[..n]);
        if data.is_empty() {
            continue;
        }
        let event = ProcessEvent::Output {
            session_id,
            generation,
            data,
        };
        if events.send(event).is_err() {
            break;
        }
    }

    debug!("[conductor:pty] Reader for session {} finished", session_id);
}

/// Decode `bytes`, holding back an incomplete trailing UTF-8 sequence in `carry`
pub(crate) fn decode_utf8_chunk(carry: &mut Vec<u8>, bytes: &[u8]) -> String {
    carry.extend_from_slice(bytes);

    let valid_up_to = match std::str::from_utf8(carry) {
        Ok(_) => carry.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // Genuinely invalid bytes: decode lossily and start fresh
        Err(_) => {
            let text = String::from_utf8_lossy(carry).into_owned();
            carry.clear();
            return text;
        }
    };

    let rest = carry.split_off(valid_up_to);
    let text = String::from_utf8_lossy(carry).into_owned();
    *carry = rest;
    text
}

/// A live agent running in a PTY
pub struct PtyProcess {
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl ProcessHandle for PtyProcess {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "process stream released",
            ));
        };
        if !self.alive.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "process has exited",
            ));
        }
        writer.write_all(bytes)?;
        writer.flush()
    }

    fn kill(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.alive.load(Ordering::SeqCst) {
            #[cfg(unix)]
            if let Some(pid) = self.pid {
                // The child leads its own session; signal the whole group so the
                // agent under the login shell goes too.
                unsafe {
                    libc::killpg(pid as libc::pid_t, libc::SIGHUP);
                }
            }
            if let Err(e) = self.killer.kill() {
                debug!("[conductor:pty] Kill of pid {:?} failed: {}", self.pid, e);
            }
        }

        // Release the stream
        self.writer = None;
        self.master = None;
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.writer.is_some()
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        self.kill();
    }
}
