//! Shared test utilities: an in-memory process spawner and conductor builders

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use conductor::agent::{EventSink, LaunchSpec, ProcessEvent, ProcessHandle, ProcessSpawner};
use conductor::config::Config;
use conductor::error::Result;
use conductor::session::SnapshotStore;
use conductor::{Conductor, ConductorError, SessionId};
use tempfile::TempDir;

/// What the fake remembers about one spawned process
pub struct FakeProcess {
    pub spec: LaunchSpec,
    pub sink: EventSink,
    pub alive: Arc<AtomicBool>,
}

#[derive(Default)]
struct FakeState {
    spawned: Vec<FakeProcess>,
    writes: HashMap<SessionId, Vec<String>>,
    fail_writes: bool,
}

/// Spawner that never starts a real process. Writes are recorded per session
/// and tests emit output or exit events through the captured sink.
#[derive(Clone, Default)]
pub struct FakeSpawner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().spawned.len()
    }

    /// Spawns for `id` whose handle has not been killed
    pub fn live_count(&self, id: SessionId) -> usize {
        self.state
            .lock()
            .unwrap()
            .spawned
            .iter()
            .filter(|p| p.spec.session_id == id && p.alive.load(Ordering::SeqCst))
            .count()
    }

    pub fn last_spec(&self, id: SessionId) -> Option<LaunchSpec> {
        self.state
            .lock()
            .unwrap()
            .spawned
            .iter()
            .rev()
            .find(|p| p.spec.session_id == id)
            .map(|p| p.spec.clone())
    }

    pub fn writes(&self, id: SessionId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .writes
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_writes(&self) -> usize {
        self.state.lock().unwrap().writes.values().map(Vec::len).sum()
    }

    /// Make every subsequent write fail like a dead stream
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// Output event from the latest process of `id`
    pub fn output_event(&self, id: SessionId, data: &str) -> ProcessEvent {
        let spec = self.last_spec(id).expect("session was never spawned");
        ProcessEvent::Output {
            session_id: id,
            generation: spec.generation,
            data: data.to_string(),
        }
    }

    /// Exit event from the latest process of `id`
    pub fn exit_event(&self, id: SessionId) -> ProcessEvent {
        let spec = self.last_spec(id).expect("session was never spawned");
        ProcessEvent::Exited {
            session_id: id,
            generation: spec.generation,
            exit_code: Some(0),
        }
    }

    /// Push an event through the sink the real worker threads would use
    pub fn emit(&self, event: ProcessEvent) {
        let state = self.state.lock().unwrap();
        let process = state
            .spawned
            .iter()
            .rev()
            .find(|p| p.spec.session_id == event.session_id())
            .expect("session was never spawned");
        process.sink.send(event).expect("event pump gone");
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, spec: &LaunchSpec, events: EventSink) -> Result<Box<dyn ProcessHandle>> {
        if !spec.directory.is_dir() {
            return Err(ConductorError::Spawn {
                id: spec.session_id,
                reason: format!("directory does not exist: {}", spec.directory.display()),
            });
        }
        let alive = Arc::new(AtomicBool::new(true));
        self.state.lock().unwrap().spawned.push(FakeProcess {
            spec: spec.clone(),
            sink: events,
            alive: alive.clone(),
        });
        Ok(Box::new(FakeHandle {
            id: spec.session_id,
            state: self.state.clone(),
            alive,
        }))
    }
}

struct FakeHandle {
    id: SessionId,
    state: Arc<Mutex<FakeState>>,
    alive: Arc<AtomicBool>,
}

impl ProcessHandle for FakeHandle {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes || !self.alive.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stream closed",
            ));
        }
        state
            .writes
            .entry(self.id)
            .or_default()
            .push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn kill(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Config tuned for tests: no graceful-exit wait, snapshot in `dir`
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.agent.stop_grace_ms = 0;
    config.state.snapshot_path = Some(dir.path().join("sessions.json"));
    config
}

/// A conductor on a fake spawner with a snapshot store in a fresh temp dir
pub fn test_conductor() -> (Conductor, FakeSpawner, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = test_config(&dir);
    let spawner = FakeSpawner::new();
    let store = SnapshotStore::new(config.snapshot_path());
    let conductor = Conductor::new(&config, Arc::new(spawner.clone()), Some(store));
    (conductor, spawner, dir)
}

/// An existing directory for sessions to run in
pub fn work_dir(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::create_dir_all(&path).expect("Failed to create work dir");
    path
}

/// Poll `check` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}
