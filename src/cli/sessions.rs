//! Session management commands

use anyhow::{Context, Result};
use std::path::PathBuf;

use conductor::client::ControlClient;

use super::print_json;

pub fn list_command(client: &ControlClient) -> Result<()> {
    let sessions = client.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    println!("Sessions ({}):\n", sessions.len());
    for session in sessions {
        println!(
            "  #{} [{}] {} ({}, port {})",
            session.id, session.status, session.name, session.role, session.mcp_port
        );
        println!("    {}", session.directory.display());
    }

    Ok(())
}

pub fn create_command(
    client: &ControlClient,
    name: &str,
    directory: Option<PathBuf>,
    mcp_port: Option<u16>,
    role: Option<&str>,
    prompt: Option<&str>,
) -> Result<()> {
    let directory = match directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    // Relative paths mean nothing to a server running elsewhere
    let directory = std::fs::canonicalize(&directory).unwrap_or(directory);

    let response = client.create_session(
        name,
        &directory.to_string_lossy(),
        mcp_port,
        role,
        prompt,
    )?;
    print_json(&response)
}

pub fn output_command(client: &ControlClient, id: u64, lines: Option<usize>) -> Result<()> {
    let output = client.output(id, lines)?;
    println!("#{} {} [{}]", output.id, output.name, output.status);
    if output.awaiting_input {
        println!("(awaiting input)");
    }
    println!();
    println!("{}", output.output);
    Ok(())
}

pub fn delete_command(client: &ControlClient, id: u64) -> Result<()> {
    print_json(&client.delete_session(id)?)
}

pub fn start_command(client: &ControlClient, id: u64) -> Result<()> {
    print_json(&client.start_session(id)?)
}

pub fn stop_command(client: &ControlClient, id: u64) -> Result<()> {
    print_json(&client.stop_session(id)?)
}
