//! Configuration loading and management

mod io;
mod settings;

pub use io::write_atomic;
pub use settings::{
    AgentSettings, BufferSettings, ServerSettings, StateSettings, DEFAULT_CONTROL_PORT,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure (~/.conductor/config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub buffer: BufferSettings,

    #[serde(default)]
    pub state: StateSettings,
}

impl Config {
    /// Snapshot path, falling back to ~/.conductor/sessions.json
    pub fn snapshot_path(&self) -> PathBuf {
        self.state
            .snapshot_path
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("sessions.json"))
    }
}
