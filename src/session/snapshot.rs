//! Snapshot persistence of the session registry.
//!
//! The snapshot is a flat JSON array of session records. Runtime state
//! (status, buffers, processes) is never written; every restored session
//! starts `Idle`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::config::write_atomic;
use crate::error::{ConductorError, Result};
use crate::{Session, SessionId, SessionRole};

/// Persisted fields of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: String,
    pub directory: PathBuf,
    pub role: SessionRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_port: Option<u16>,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            directory: session.directory.clone(),
            role: session.role,
            mcp_port: Some(session.mcp_port),
        }
    }
}

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. A missing file is an empty snapshot.
    pub fn load(&self) -> Result<Vec<SessionRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "[conductor:snapshot] No snapshot at {}, starting empty",
                    self.path.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            ConductorError::Persistence(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Load the snapshot, degrading to an empty list on any failure
    pub fn load_or_empty(&self) -> Vec<SessionRecord> {
        match self.load() {
            Ok(records) => {
                info!(
                    "[conductor:snapshot] Restored {} session(s) from {}",
                    records.len(),
                    self.path.display()
                );
                records
            }
            Err(e) => {
                error!("[conductor:snapshot] {}; continuing with no sessions", e);
                Vec::new()
            }
        }
    }

    /// Write the snapshot atomically
    pub fn save(&self, records: &[SessionRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(records)
            .map_err(|e| ConductorError::Persistence(format!("failed to serialize: {}", e)))?;
        write_atomic(&self.path, content.as_bytes()).map_err(|e| {
            ConductorError::Persistence(format!("failed to write {}: {:#}", self.path.display(), e))
        })?;
        debug!(
            "[conductor:snapshot] Saved {} session(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}
