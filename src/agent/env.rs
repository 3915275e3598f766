//! Launch environment for agent processes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Tool-install locations added to PATH when missing, so a restricted launch
/// environment (e.g. a GUI-started controller) can still find the agent binary.
const EXTRA_PATH_DIRS_HOME: &[&str] = &[
    ".local/bin",
    ".claude/local",
    ".npm-global/bin",
    ".bun/bin",
    ".cargo/bin",
];

const EXTRA_PATH_DIRS_SYSTEM: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];

/// Variables set on every agent process
pub fn launch_env(port_env_var: &str, mcp_port: u16) -> Vec<(String, String)> {
    let mut env = vec![
        ("TERM".to_string(), "xterm-256color".to_string()),
        ("COLORTERM".to_string(), "truecolor".to_string()),
        ("FORCE_COLOR".to_string(), "1".to_string()),
    ];

    if !port_env_var.trim().is_empty() {
        env.push((port_env_var.to_string(), mcp_port.to_string()));
    }

    let path = augmented_path(std::env::var_os("PATH"), dirs::home_dir().as_deref());
    env.push(("PATH".to_string(), path.to_string_lossy().into_owned()));

    env
}

/// Append the well-known tool directories that `current` does not already contain
pub fn augmented_path(current: Option<OsString>, home: Option<&Path>) -> OsString {
    let mut entries: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(home) = home {
        candidates.extend(EXTRA_PATH_DIRS_HOME.iter().map(|d| home.join(d)));
    }
    candidates.extend(EXTRA_PATH_DIRS_SYSTEM.iter().map(PathBuf::from));
    candidates.push(PathBuf::from("/usr/bin"));
    candidates.push(PathBuf::from("/bin"));

    for candidate in candidates {
        if !entries.contains(&candidate) {
            entries.push(candidate);
        }
    }

    std::env::join_paths(entries).unwrap_or_else(|_| current.unwrap_or_default())
}
