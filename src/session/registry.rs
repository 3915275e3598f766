//! Canonical store of sessions and dispatch history.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::warn;

use super::snapshot::SessionRecord;
use crate::error::{ConductorError, Result};
use crate::{DispatchTask, Session, SessionId, SessionRole, SessionStatus};

/// First auxiliary port handed to a worker when none is requested
pub const DEFAULT_FIRST_PORT: u16 = 55558;

/// Ordered session list plus append-only dispatch history.
///
/// The registry holds metadata only. Processes and buffers live in the
/// supervisor, keyed by the same ids.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    tasks: Vec<DispatchTask>,
    next_id: SessionId,
    /// Wider than a port so that running past 65535 is observable
    next_port: u32,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_PORT)
    }
}

impl SessionRegistry {
    pub fn new(first_port: u16) -> Self {
        Self {
            sessions: Vec::new(),
            tasks: Vec::new(),
            next_id: 1,
            next_port: u32::from(first_port),
        }
    }

    /// Rebuild a registry from snapshot records.
    ///
    /// Every restored session starts `Idle`. Records reusing an id that was
    /// already restored are dropped.
    pub fn from_records(records: Vec<SessionRecord>, first_port: u16) -> Self {
        let mut registry = Self::new(first_port);
        let mut seen = HashSet::new();
        let records: Vec<SessionRecord> = records
            .into_iter()
            .filter(|record| {
                let first = seen.insert(record.id);
                if !first {
                    warn!(
                        "[conductor:registry] Dropping duplicate session id {} ({}) from snapshot",
                        record.id, record.name
                    );
                }
                first
            })
            .collect();
        // Ports pinned by a later record must not be handed to an earlier one
        let pinned: Vec<u16> = records.iter().filter_map(|r| r.mcp_port).collect();

        for record in records {
            let port = match record.mcp_port {
                Some(port) => port,
                None => match registry.allocate_port_avoiding(&pinned) {
                    Some(port) => port,
                    None => {
                        warn!(
                            "[conductor:registry] No free port for session {} ({}), dropping it",
                            record.id, record.name
                        );
                        continue;
                    }
                },
            };
            let session = Session::new(record.id, record.name, record.directory, port, record.role);
            registry.track_allocations(&session);
            registry.sessions.push(session);
        }

        registry
    }

    fn track_allocations(&mut self, session: &Session) {
        self.next_id = self.next_id.max(session.id.saturating_add(1));
        self.next_port = self.next_port.max(u32::from(session.mcp_port) + 1);
    }

    /// Next port not held by any session, or `None` once the range is used up
    fn allocate_port(&mut self) -> Option<u16> {
        self.allocate_port_avoiding(&[])
    }

    fn allocate_port_avoiding(&mut self, reserved: &[u16]) -> Option<u16> {
        while let Ok(port) = u16::try_from(self.next_port) {
            self.next_port += 1;
            let taken =
                reserved.contains(&port) || self.sessions.iter().any(|s| s.mcp_port == port);
            if !taken {
                return Some(port);
            }
        }
        None
    }

    /// Add a new session and return a reference to it.
    ///
    /// Fails when no port was requested and none is left; nothing is added then.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        mcp_port: Option<u16>,
        role: SessionRole,
    ) -> Result<&Session> {
        let id = self.next_id;
        let port = match mcp_port {
            Some(port) => port,
            None => self
                .allocate_port()
                .ok_or_else(|| ConductorError::validation("no free auxiliary port left"))?,
        };
        let session = Session::new(id, name, directory, port, role);
        self.track_allocations(&session);
        self.sessions.push(session);
        Ok(&self.sessions[self.sessions.len() - 1])
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    /// Remove a session. Dispatch history referencing it is kept.
    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        let idx = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(idx))
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of worker sessions in registry order
    pub fn worker_ids(&self) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|s| s.is_worker())
            .map(|s| s.id)
            .collect()
    }

    /// Set the status of a session, returning false for unknown ids
    pub fn set_status(&mut self, id: SessionId, status: SessionStatus) -> bool {
        match self.get_mut(id) {
            Some(session) => {
                session.set_status(status);
                true
            }
            None => false,
        }
    }

    pub fn record_task(&mut self, task: DispatchTask) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[DispatchTask] {
        &self.tasks
    }

    pub fn tasks_for(&self, id: SessionId) -> Vec<&DispatchTask> {
        self.tasks
            .iter()
            .filter(|t| t.target_session_id == id)
            .collect()
    }

    /// Flat, ordered snapshot of the persisted fields
    pub fn to_records(&self) -> Vec<SessionRecord> {
        self.sessions.iter().map(SessionRecord::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: SessionId, name: &str, port: Option<u16>) -> SessionRecord {
        SessionRecord {
            id,
            name: name.to_string(),
            directory: PathBuf::from("/tmp"),
            role: SessionRole::Worker,
            mcp_port: port,
        }
    }

    #[test]
    fn test_add_allocates_ids_and_ports() {
        let mut registry = SessionRegistry::new(55558);
        let a = registry.add("a", "/tmp", None, SessionRole::Worker).unwrap().clone();
        let b = registry.add("b", "/tmp", None, SessionRole::Conductor).unwrap().clone();
        let c = registry.add("c", "/tmp", Some(60000), SessionRole::Worker).unwrap().clone();
        let d = registry.add("d", "/tmp", None, SessionRole::Worker).unwrap().clone();

        assert_eq!((a.id, a.mcp_port), (1, 55558));
        assert_eq!((b.id, b.mcp_port), (2, 55559));
        assert_eq!((c.id, c.mcp_port), (3, 60000));
        assert_eq!((d.id, d.mcp_port), (4, 60001));
        assert_eq!(registry.worker_ids(), vec![1, 3, 4]);
    }

    #[test]
    fn test_remove_keeps_history() {
        let mut registry = SessionRegistry::default();
        let id = registry.add("a", "/tmp", None, SessionRole::Worker).unwrap().id;
        registry.record_task(DispatchTask::new(id, "hello"));

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.tasks().len(), 1);
    }

    #[test]
    fn test_from_records_drops_duplicates_and_resets_status() {
        let registry = SessionRegistry::from_records(
            vec![
                record(3, "first", Some(55560)),
                record(3, "dupe", Some(55561)),
                record(7, "second", None),
            ],
            55558,
        );

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(3).map(|s| s.name.as_str()), Some("first"));
        assert_eq!(registry.get(7).map(|s| s.mcp_port), Some(55561));
        assert!(registry.sessions().iter().all(|s| s.status == SessionStatus::Idle));

        let mut registry = registry;
        let next = registry.add("new", "/tmp", None, SessionRole::Worker).unwrap();
        assert_eq!(next.id, 8);
        assert_eq!(next.mcp_port, 55562);
    }

    #[test]
    fn test_port_allocation_skips_taken_and_stops_at_range_end() {
        let mut registry = SessionRegistry::new(65533);
        registry.add("pinned", "/tmp", Some(65534), SessionRole::Worker).unwrap();
        registry.add("low", "/tmp", Some(65533), SessionRole::Worker).unwrap();

        let last = registry.add("a", "/tmp", None, SessionRole::Worker).unwrap();
        assert_eq!(last.mcp_port, 65535);

        let err = registry.add("b", "/tmp", None, SessionRole::Worker).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(registry.len(), 3);

        // An explicit port is still accepted
        assert!(registry.add("c", "/tmp", Some(7000), SessionRole::Worker).is_ok());
    }

    #[test]
    fn test_restored_portless_record_skips_later_pinned_port() {
        let registry = SessionRegistry::from_records(
            vec![record(1, "legacy", None), record(2, "pinned", Some(55558))],
            55558,
        );

        assert_eq!(registry.get(1).map(|s| s.mcp_port), Some(55559));
        assert_eq!(registry.get(2).map(|s| s.mcp_port), Some(55558));
    }

    #[test]
    fn test_set_status_unknown_id() {
        let mut registry = SessionRegistry::default();
        assert!(!registry.set_status(42, SessionStatus::Working));
    }
}
