//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `serve` (default) -- start the HTTP server
//! - `create|vote|show|end|remove` -- run one poll operation against the configured store
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

use clap::{Parser, Subcommand};

/// Chat poll service.
#[derive(Parser, Debug)]
#[command(
    name = "chatpoll",
    version = env!("CARGO_PKG_VERSION"),
    about = "Single-choice polls for chat channels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,

    /// Create a poll from command text, e.g. '"Lunch?" "Pizza" "Salad"'.
    Create {
        /// Quoted question followed by quoted options.
        text: String,
    },

    /// Record or change a vote.
    Vote {
        poll_id: String,
        option_id: String,
        voter_id: String,
    },

    /// Print a poll and its current ledger as JSON.
    Show { poll_id: String },

    /// Print the end-of-poll summary.
    End { poll_id: String },

    /// Delete a poll and its ledger.
    Remove { poll_id: String },

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::config::{self, Config};
use crate::polls::{parse_command, render, PollService};
use crate::server;

type CliResult = Result<(), Box<dyn std::error::Error>>;

async fn open_service(cfg: &Config) -> Result<PollService, Box<dyn std::error::Error>> {
    if !cfg.storage.is_persistent() {
        tracing::warn!("Using in-memory storage; polls will not outlive this command");
    }
    Ok(server::build_service(cfg).await?)
}

/// Run the `serve` subcommand.
pub async fn handle_serve(cfg: &Config) -> CliResult {
    server::serve(cfg).await?;
    Ok(())
}

/// Run the `create <text>` subcommand.
pub async fn handle_create(cfg: &Config, text: &str) -> CliResult {
    let new_poll = parse_command(text)?;
    let service = open_service(cfg).await?;
    let poll = service.create(new_poll).await?;
    let message = render::poll_message(&poll, &cfg.public_url());
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

/// Run the `vote <poll_id> <option_id> <voter_id>` subcommand.
pub async fn handle_vote(cfg: &Config, poll_id: &str, option_id: &str, voter_id: &str) -> CliResult {
    let service = open_service(cfg).await?;
    let changed = service.record_vote(poll_id, option_id, voter_id).await?;
    if let Some(text) = render::vote_ack(changed).ephemeral_text {
        println!("{}", text);
    }
    Ok(())
}

/// Run the `show <poll_id>` subcommand.
pub async fn handle_show(cfg: &Config, poll_id: &str) -> CliResult {
    let service = open_service(cfg).await?;
    let poll = service.get(poll_id).await?;
    let ledger = service.ledger(poll_id).await?;
    let output = serde_json::json!({ "poll": poll, "votes": ledger });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run the `end <poll_id>` subcommand.
pub async fn handle_end(cfg: &Config, poll_id: &str) -> CliResult {
    let service = open_service(cfg).await?;
    let (poll, tally) = service.end(poll_id).await?;
    println!("{}", render::end_summary(&poll, &tally));
    Ok(())
}

/// Run the `remove <poll_id>` subcommand.
pub async fn handle_remove(cfg: &Config, poll_id: &str) -> CliResult {
    let service = open_service(cfg).await?;
    let outcome = service.remove(poll_id).await?;
    if outcome.ledger_retained() {
        eprintln!("Removed poll {} but its vote record could not be deleted", poll_id);
    } else {
        println!("Removed poll {}", poll_id);
    }
    Ok(())
}

/// Run the `config show` subcommand.
pub fn handle_config_show(cfg: &Config) -> CliResult {
    println!("{}", serde_json::to_string_pretty(cfg)?);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path() {
    println!("{}", config::get_config_path().display());
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("chatpoll {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("CHATPOLL_BUILD_DATE"));
    println!("  Git commit: {}", env!("CHATPOLL_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, cfg: &Config) -> CliResult {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => handle_serve(cfg).await,
        Command::Create { text } => handle_create(cfg, &text).await,
        Command::Vote {
            poll_id,
            option_id,
            voter_id,
        } => handle_vote(cfg, &poll_id, &option_id, &voter_id).await,
        Command::Show { poll_id } => handle_show(cfg, &poll_id).await,
        Command::End { poll_id } => handle_end(cfg, &poll_id).await,
        Command::Remove { poll_id } => handle_remove(cfg, &poll_id).await,
        Command::Config(ConfigCommand::Show) => handle_config_show(cfg),
        Command::Config(ConfigCommand::Path) => {
            handle_config_path();
            Ok(())
        }
        Command::Version => {
            handle_version();
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
