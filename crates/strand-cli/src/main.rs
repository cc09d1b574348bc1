use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strand_cli::cli::command::relay_policy;
use strand_cli::cli::{execute, CliCommand, CliConfig};
use strand_core::tracing_setup::init_tracing;
use strand_core::Session;

#[derive(Parser)]
#[command(name = "strand")]
#[command(about = "Keep a Nostr account's lists in sync across relays")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (contains dataDir, priorityRelays, credentials)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show list load state, relay pool and connection stats
    Status,

    /// List followed accounts
    Following,

    /// List muted accounts, allowlist and subscribed filter lists
    Muted,

    /// Follow an account (hex or npub)
    Follow { pubkey: String },

    /// Unfollow an account
    Unfollow { pubkey: String },

    /// Mute an account
    Mute { pubkey: String },

    /// Unmute an account
    Unmute { pubkey: String },

    /// Add an account to the allowlist
    Allow { pubkey: String },

    /// Remove an account from the allowlist
    Disallow { pubkey: String },

    /// Subscribe to another account's mute list
    AddFilterList { pubkey: String },

    /// Unsubscribe from another account's mute list
    RemoveFilterList { pubkey: String },

    /// Show relay settings and the connection pool
    Relays,

    /// Add a relay to the account's relay list
    AddRelay {
        url: String,
        #[arg(long)]
        read_only: bool,
        #[arg(long)]
        write_only: bool,
    },

    /// Remove a relay from the account's relay list
    RemoveRelay { url: String },

    /// React "+" to an event
    Like {
        /// Event ID (hex or note)
        event_id: String,
        /// Author of the event (hex or npub)
        author: String,
    },

    /// Show recently used emoji, or record one
    Emoji { emoji: Option<String> },
}

impl Commands {
    fn into_command(self) -> Result<CliCommand> {
        let command = match self {
            Commands::Status => CliCommand::Status,
            Commands::Following => CliCommand::Following,
            Commands::Muted => CliCommand::Muted,
            Commands::Follow { pubkey } => CliCommand::Follow { pubkey },
            Commands::Unfollow { pubkey } => CliCommand::Unfollow { pubkey },
            Commands::Mute { pubkey } => CliCommand::Mute { pubkey },
            Commands::Unmute { pubkey } => CliCommand::Unmute { pubkey },
            Commands::Allow { pubkey } => CliCommand::Allow { pubkey },
            Commands::Disallow { pubkey } => CliCommand::Disallow { pubkey },
            Commands::AddFilterList { pubkey } => CliCommand::AddFilterList { pubkey },
            Commands::RemoveFilterList { pubkey } => CliCommand::RemoveFilterList { pubkey },
            Commands::Relays => CliCommand::Relays,
            Commands::AddRelay {
                url,
                read_only,
                write_only,
            } => CliCommand::AddRelay {
                url,
                policy: relay_policy(read_only, write_only)?,
            },
            Commands::RemoveRelay { url } => CliCommand::RemoveRelay { url },
            Commands::Like { event_id, author } => CliCommand::Like { event_id, author },
            Commands::Emoji { emoji } => CliCommand::Emoji { emoji },
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let command = cli.command.into_command()?;
    let keys = config.keys()?;

    let session = Session::start(config.core_config(), Arc::new(keys));
    if let Err(e) = session.load().await {
        if !command.is_read_only() {
            return Err(e).context("Failed to load account");
        }
        tracing::warn!("Showing local state only: {}", e);
    }

    let result = execute(&session, command).await;
    session.shutdown();
    let value = result?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .context("Failed to serialize output")?;
    println!("{}", output);
    Ok(())
}
