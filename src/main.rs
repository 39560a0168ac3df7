//! game-of-claude - Gamification for Claude Code
//!
//! Registers this machine with the Game of Claude service and installs the
//! Claude Code hooks that report session and tool events to it.

use std::io;
use std::process;

use clap::{Parser, Subcommand};

use game_of_claude::{logging, Commands, Config, HttpService, Paths, TerminalPrompter};

/// Gamification for Claude Code.
#[derive(Parser)]
#[command(name = "game-of-claude", version, about)]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set up hooks and create your character
    Install,
    /// Pause tracking (keeps your data)
    Stop,
    /// Permanently delete all your data
    DeleteData,
    /// Show your XP and daily quests
    Status {
        /// Print the raw profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change your character name
    Rename,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(command: Command) -> anyhow::Result<()> {
    let paths = Paths::resolve()?;
    let config = Config::load();
    tracing::debug!(?config, ?paths, "resolved configuration");

    let service = HttpService::new(&config.api_base);
    let mut commands = Commands::new(paths, config, service, TerminalPrompter, io::stdout());

    match command {
        Command::Install => commands.install(),
        Command::Stop => commands.stop(),
        Command::DeleteData => commands.delete_data(),
        Command::Status { json } => commands.status(json),
        Command::Rename => commands.rename(),
    }
}
