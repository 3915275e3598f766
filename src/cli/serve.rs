//! Serve command implementation

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use conductor::agent::PtySpawner;
use conductor::config::Config;
use conductor::http_server::ControlServer;
use conductor::session::SnapshotStore;
use conductor::Conductor;

/// Run the conductor and its control API until Ctrl+C
pub async fn serve_command(
    config_path: Option<&Path>,
    port: Option<u16>,
    state: Option<PathBuf>,
    ephemeral: bool,
) -> Result<()> {
    let mut config = Config::load_from(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(state) = state {
        config.state.snapshot_path = Some(state);
    }

    let store = if ephemeral {
        None
    } else {
        Some(SnapshotStore::new(config.snapshot_path()))
    };
    if let Some(store) = &store {
        info!("[conductor] Snapshot file: {}", store.path().display());
    }

    let conductor = Conductor::new(&config, Arc::new(PtySpawner::new()), store);
    let mut server = ControlServer::start(conductor.clone(), config.server.port)?;

    println!(
        "Conductor listening on {} ({} session(s) restored)",
        server.url(),
        conductor.session_count()
    );
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("[conductor] Shutting down");
    server.shutdown();
    conductor.shutdown();
    Ok(())
}
