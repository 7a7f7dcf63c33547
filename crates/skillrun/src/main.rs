//! skillrun: skill-driven agent CLI
//!
//! Runs one request at a time through a tool-calling loop against any
//! OpenAI-compatible endpoint, asking before each tool call and keeping
//! conversation state across runs.

mod agent;
mod commands;
mod prompt;
mod session;
mod skills;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use skillrun_core::Config;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "skillrun")]
#[command(about = "Skill-driven agent with tool approvals and persistent sessions", version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List discovered skills
    List,

    /// Run a request through the agent
    Run {
        /// The request
        input: Vec<String>,

        /// Skill to use (auto-selected when omitted)
        #[arg(short, long)]
        skill: Option<String>,

        /// Model to use (auto-selected from [[models]] when omitted)
        #[arg(short, long)]
        model: Option<String>,

        /// Approve every tool call without asking
        #[arg(long)]
        allow: bool,
    },

    /// Show the current session
    Session {
        /// Start a fresh session
        #[arg(long)]
        new: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::List => commands::list(&config),
        Commands::Run {
            input,
            skill,
            model,
            allow,
        } => {
            let input = input.join(" ");
            commands::run(&config, skill, model, allow, &input).await
        }
        Commands::Session { new } => commands::session(&config, new),
    }
}
