//! Settings sections of the conductor config file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::session::{DEFAULT_FIRST_PORT, DEFAULT_MAX_BYTES};

/// Default port of the local control API
pub const DEFAULT_CONTROL_PORT: u16 = 9880;

/// Control API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Loopback port the control API listens on
    /// Default: 9880
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

/// How agent processes are launched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Command run inside the login shell
    /// Default: "claude"
    #[serde(default = "default_command")]
    pub command: String,

    /// Shell used to launch the command so user shell config applies.
    /// Default: $SHELL, falling back to /bin/zsh
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Arguments placed between the shell and the command
    /// Default: ["-l", "-i", "-c"]
    #[serde(default = "default_shell_args")]
    pub shell_args: Vec<String>,

    /// Environment variable carrying the session's auxiliary port
    #[serde(default = "default_port_env_var")]
    pub port_env_var: String,

    /// First auxiliary port allocated to sessions created without one
    #[serde(default = "default_first_port")]
    pub first_port: u16,

    /// Appended to every dispatched prompt
    /// Default: "\r" (Enter in a raw-mode terminal)
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,

    #[serde(default = "default_rows")]
    pub rows: u16,

    #[serde(default = "default_cols")]
    pub cols: u16,

    /// How long a deleted session may take to honour `/exit` before it is killed
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// Start the agent process as soon as a session is created
    #[serde(default = "default_true")]
    pub start_on_create: bool,

    /// Start every restored session at boot
    #[serde(default)]
    pub autostart_restored: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            shell: default_shell(),
            shell_args: default_shell_args(),
            port_env_var: default_port_env_var(),
            first_port: default_first_port(),
            line_terminator: default_line_terminator(),
            rows: default_rows(),
            cols: default_cols(),
            stop_grace_ms: default_stop_grace_ms(),
            start_on_create: true,
            autostart_restored: false,
        }
    }
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "/bin/zsh".to_string())
}

fn default_shell_args() -> Vec<String> {
    vec!["-l".to_string(), "-i".to_string(), "-c".to_string()]
}

fn default_port_env_var() -> String {
    "MCP_PORT".to_string()
}

fn default_first_port() -> u16 {
    DEFAULT_FIRST_PORT
}

fn default_line_terminator() -> String {
    "\r".to_string()
}

fn default_rows() -> u16 {
    40
}

fn default_cols() -> u16 {
    120
}

fn default_stop_grace_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

/// Output buffer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSettings {
    /// Byte budget of each session's output buffer
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Lines returned by the output endpoint when none are requested
    #[serde(default = "default_output_lines")]
    pub output_lines: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            output_lines: default_output_lines(),
        }
    }
}

fn default_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

fn default_output_lines() -> usize {
    100
}

/// Where the session snapshot lives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSettings {
    /// Snapshot file. Default: ~/.conductor/sessions.json
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}
