//! The coordinating owner of all session state.
//!
//! Registry and supervisor live behind one mutex. Control API calls lock it
//! directly; process output and exits arrive as [`ProcessEvent`]s on a
//! channel drained by a single event-pump thread that applies them under the
//! same lock. Nothing else mutates session state.

mod dispatch;
mod lifecycle;

pub use dispatch::DispatchReceipt;
pub use lifecycle::{NewSession, SessionOutput};

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use tracing::{debug, error, info};

use crate::agent::{ProcessEvent, ProcessSpawner, Supervisor};
use crate::config::{AgentSettings, BufferSettings, Config};
use crate::session::{SessionRegistry, SnapshotStore};
use crate::{SessionId, SessionStatus};

/// State guarded by the conductor lock
pub struct ConductorState {
    pub(crate) registry: SessionRegistry,
    pub(crate) supervisor: Supervisor,
}

impl ConductorState {
    /// Apply one process event. Events from replaced or stopped processes are ignored.
    pub(crate) fn apply_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output {
                session_id,
                generation,
                data,
            } => {
                let Some(awaiting) = self.supervisor.on_output(session_id, generation, &data)
                else {
                    return;
                };
                if !awaiting {
                    return;
                }
                if let Some(session) = self.registry.get_mut(session_id) {
                    if session.status == SessionStatus::Working {
                        session.set_status(SessionStatus::WaitingForInput);
                        debug!(
                            "[conductor:events] Session {} is waiting for input",
                            session_id
                        );
                    }
                }
            }
            ProcessEvent::Exited {
                session_id,
                generation,
                exit_code,
            } => {
                if !self.supervisor.on_exit(session_id, generation) {
                    return;
                }
                if self
                    .registry
                    .set_status(session_id, SessionStatus::Disconnected)
                {
                    info!(
                        "[conductor:events] Session {} process exited (code {:?})",
                        session_id, exit_code
                    );
                }
            }
        }
    }
}

struct Inner {
    state: Mutex<ConductorState>,
    store: Option<SnapshotStore>,
    agent: AgentSettings,
    buffer: BufferSettings,
}

/// Cheaply cloneable handle to the coordinating owner
#[derive(Clone)]
pub struct Conductor {
    inner: Arc<Inner>,
}

impl Conductor {
    /// Build a conductor, restoring sessions from `store` when given.
    ///
    /// Restored sessions start `Idle`; they are only started here when
    /// `agent.autostart_restored` is set.
    pub fn new(
        config: &Config,
        spawner: Arc<dyn ProcessSpawner>,
        store: Option<SnapshotStore>,
    ) -> Self {
        let records = store
            .as_ref()
            .map(|s| s.load_or_empty())
            .unwrap_or_default();
        let registry = SessionRegistry::from_records(records, config.agent.first_port);

        let (events_tx, events_rx) = mpsc::channel();
        let supervisor = Supervisor::new(spawner, events_tx, config.agent.clone(), &config.buffer);

        let inner = Arc::new(Inner {
            state: Mutex::new(ConductorState {
                registry,
                supervisor,
            }),
            store,
            agent: config.agent.clone(),
            buffer: config.buffer.clone(),
        });
        spawn_event_pump(Arc::downgrade(&inner), events_rx);

        let conductor = Self { inner };

        if config.agent.autostart_restored {
            for id in conductor.session_ids() {
                if let Err(e) = conductor.start_session(id) {
                    error!("[conductor] Failed to autostart session {}: {}", id, e);
                }
            }
        }

        conductor
    }

    fn lock(&self) -> MutexGuard<'_, ConductorState> {
        lock_state(&self.inner.state)
    }

    fn session_ids(&self) -> Vec<SessionId> {
        self.lock().registry.sessions().iter().map(|s| s.id).collect()
    }

    /// Write the current registry to the snapshot store. Failures are logged;
    /// the in-memory registry stays authoritative.
    fn persist(&self, state: &ConductorState) {
        let Some(store) = self.inner.store.as_ref() else {
            return;
        };
        if let Err(e) = store.save(&state.registry.to_records()) {
            error!("[conductor] Failed to persist snapshot: {}", e);
        }
    }

    /// Apply a process event synchronously (the event pump does this for spawned processes)
    pub fn apply_event(&self, event: ProcessEvent) {
        self.lock().apply_event(event);
    }

    /// Number of live process handles across all sessions
    pub fn handle_count(&self) -> usize {
        self.lock().supervisor.handle_count()
    }

    pub fn has_handle(&self, id: SessionId) -> bool {
        self.lock().supervisor.has_handle(id)
    }

    /// Stop every session's process
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let count = state.supervisor.handle_count();
        state.supervisor.stop_all();
        let ids: Vec<SessionId> = state.registry.sessions().iter().map(|s| s.id).collect();
        for id in ids {
            state.registry.set_status(id, SessionStatus::Idle);
        }
        info!("[conductor] Shut down {} session process(es)", count);
    }
}

fn lock_state(state: &Mutex<ConductorState>) -> MutexGuard<'_, ConductorState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn spawn_event_pump(inner: Weak<Inner>, events: Receiver<ProcessEvent>) {
    let result = thread::Builder::new()
        .name("conductor-events".to_string())
        .spawn(move || {
            for event in events {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                lock_state(&inner.state).apply_event(event);
            }
            debug!("[conductor:events] Event pump finished");
        });

    if let Err(e) = result {
        error!("[conductor:events] Failed to start event pump: {}", e);
    }
}
