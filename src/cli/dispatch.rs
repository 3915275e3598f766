//! Dispatch and wait commands

use anyhow::Result;
use std::time::Duration;

use conductor::client::{wait_for_completion, ControlClient, WaitOptions};
use conductor::SessionRole;

use super::print_json;

pub fn send_command(client: &ControlClient, id: u64, message: &str) -> Result<()> {
    print_json(&client.send(id, message)?)
}

pub fn broadcast_command(client: &ControlClient, message: &str) -> Result<()> {
    print_json(&client.broadcast(message)?)
}

pub fn tasks_command(client: &ControlClient, session: Option<u64>) -> Result<()> {
    print_json(&client.tasks(session)?)
}

pub async fn wait_command(
    client: &ControlClient,
    ids: Vec<u64>,
    timeout_secs: u64,
    interval_secs: u64,
    lines: usize,
) -> Result<()> {
    let targets = if ids.is_empty() {
        let lookup = client.clone();
        tokio::task::spawn_blocking(move || lookup.list_sessions())
            .await??
            .into_iter()
            .filter(|s| s.role == SessionRole::Worker)
            .map(|s| s.id)
            .collect()
    } else {
        ids
    };

    if targets.is_empty() {
        println!("No sessions to wait for.");
        return Ok(());
    }

    let options = WaitOptions {
        timeout: Duration::from_secs(timeout_secs),
        interval: Duration::from_secs(interval_secs.max(1)),
        lines,
    };
    let report = wait_for_completion(client, targets, options).await?;

    if report.timed_out {
        eprintln!(
            "Timed out after {}s; still working: {:?}",
            timeout_secs, report.pending
        );
    }
    print_json(&serde_json::to_value(&report)?)
}
