//! CLI command implementations

pub mod dispatch;
pub mod serve;
pub mod sessions;

use anyhow::Result;
use std::path::Path;

use conductor::client::ControlClient;
use conductor::config::Config;

/// Client for the control API, on `port` or the configured one
pub fn client(config_path: Option<&Path>, port: Option<u16>) -> Result<ControlClient> {
    let port = match port {
        Some(port) => port,
        None => Config::load_from(config_path)?.server.port,
    };
    Ok(ControlClient::new(port))
}

pub(crate) fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
