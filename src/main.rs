use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Run and orchestrate interactive CLI-agent sessions over a local control API")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.conductor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Control API port (defaults to the configured port)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conductor and its control API until Ctrl+C
    Serve {
        /// Snapshot file (defaults to ~/.conductor/sessions.json)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Keep sessions in memory only; no snapshot is read or written
        #[arg(long)]
        ephemeral: bool,
    },

    /// List sessions of a running conductor
    List,

    /// Create a session
    Create {
        /// Session name
        name: String,

        /// Working directory (defaults to current directory)
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Port handed to the agent (allocated when omitted)
        #[arg(long)]
        mcp_port: Option<u16>,

        /// "worker" or "conductor"
        #[arg(long)]
        role: Option<String>,

        /// First message sent once the agent has started
        #[arg(long)]
        initial_prompt: Option<String>,
    },

    /// Send a message to one session
    Send { id: u64, message: String },

    /// Send a message to every worker session
    Broadcast { message: String },

    /// Show recent output of a session
    Output {
        id: u64,

        #[arg(short, long)]
        lines: Option<usize>,
    },

    /// Stop a session's process and remove the session
    Delete { id: u64 },

    /// (Re)start a session's process
    Start { id: u64 },

    /// Stop a session's process, keeping the session
    Stop { id: u64 },

    /// Show dispatched tasks
    Tasks {
        #[arg(long)]
        session: Option<u64>,
    },

    /// Wait until sessions are back at their prompt
    Wait {
        /// Sessions to wait for (defaults to every worker)
        ids: Vec<u64>,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval: u64,

        /// Lines of output to collect per session
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Serve { state, ephemeral }) => {
            cli::serve::serve_command(config_path, cli.port, state, ephemeral).await?;
        }
        Some(Commands::List) => {
            cli::sessions::list_command(&cli::client(config_path, cli.port)?)?;
        }
        Some(Commands::Create {
            name,
            directory,
            mcp_port,
            role,
            initial_prompt,
        }) => {
            let client = cli::client(config_path, cli.port)?;
            cli::sessions::create_command(
                &client,
                &name,
                directory,
                mcp_port,
                role.as_deref(),
                initial_prompt.as_deref(),
            )?;
        }
        Some(Commands::Send { id, message }) => {
            cli::dispatch::send_command(&cli::client(config_path, cli.port)?, id, &message)?;
        }
        Some(Commands::Broadcast { message }) => {
            cli::dispatch::broadcast_command(&cli::client(config_path, cli.port)?, &message)?;
        }
        Some(Commands::Output { id, lines }) => {
            cli::sessions::output_command(&cli::client(config_path, cli.port)?, id, lines)?;
        }
        Some(Commands::Delete { id }) => {
            cli::sessions::delete_command(&cli::client(config_path, cli.port)?, id)?;
        }
        Some(Commands::Start { id }) => {
            cli::sessions::start_command(&cli::client(config_path, cli.port)?, id)?;
        }
        Some(Commands::Stop { id }) => {
            cli::sessions::stop_command(&cli::client(config_path, cli.port)?, id)?;
        }
        Some(Commands::Tasks { session }) => {
            cli::dispatch::tasks_command(&cli::client(config_path, cli.port)?, session)?;
        }
        Some(Commands::Wait {
            ids,
            timeout,
            interval,
            lines,
        }) => {
            let client = cli::client(config_path, cli.port)?;
            cli::dispatch::wait_command(&client, ids, timeout, interval, lines).await?;
        }
        None => {
            // Default: run the conductor
            cli::serve::serve_command(config_path, cli.port, None, false).await?;
        }
    }

    Ok(())
}
