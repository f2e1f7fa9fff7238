//! # Ledgerview CLI Module
//!
//! ## Available Commands
//!
//! - `view` - Build a ledger from a fixture and print one view
//! - `simulate` - Replay a fixture against an active live view, polling a
//!   focused entity
//! - `server` - Start the HTTP server

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use ledgerview_core::ViewError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Ledgerview - live account views over an append-only event log
#[derive(Parser, Debug)]
#[command(name = "ledgerview")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show entity attributes in text output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a ledgerview.toml (default: ./ledgerview.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which view to build.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainArg {
    Friends,
    Groups,
    Messages,
    Sessions,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a view once and print it
    View {
        /// Fixture describing the ledger history
        #[arg(short, long)]
        fixture: PathBuf,

        /// Viewing account (default: the fixture's viewer)
        #[arg(short, long)]
        account: Option<String>,

        /// View to build
        #[arg(short, long, value_enum, default_value = "friends")]
        domain: DomainArg,

        /// Group id (required for the messages view)
        #[arg(short, long)]
        group: Option<String>,

        /// Entity to keep in view even if the scan misses it
        #[arg(long)]
        focus: Option<String>,

        /// Registered username to focus (friends view)
        #[arg(long, conflicts_with = "focus")]
        focus_username: Option<String>,
    },

    /// Replay a fixture step by step against an active live view
    Simulate {
        /// Fixture describing the ledger history
        #[arg(short, long)]
        fixture: PathBuf,

        /// Viewing account (default: the fixture's viewer)
        #[arg(short, long)]
        account: Option<String>,

        /// View to maintain
        #[arg(short, long, value_enum, default_value = "friends")]
        domain: DomainArg,

        /// Group id (required for the messages view)
        #[arg(short, long)]
        group: Option<String>,

        /// Entity to re-read every poll interval (a session id for sessions)
        #[arg(long)]
        focus: Option<String>,

        /// Registered username to focus (friends view)
        #[arg(long, conflicts_with = "focus")]
        focus_username: Option<String>,

        /// Pause after each step so live events land before printing
        #[arg(long, default_value = "50")]
        delay_ms: u64,
    },

    /// Start HTTP server
    Server {
        /// Fixture to seed the ledger with
        #[arg(short, long)]
        fixture: Option<PathBuf>,

        /// Served account (default: the fixture's viewer)
        #[arg(short, long)]
        account: Option<String>,

        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

fn focus_arg(id: Option<String>, username: Option<String>) -> Option<FocusArg> {
    id.map(FocusArg::Id).or(username.map(FocusArg::Username))
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ViewError> {
    let config = ledgerview::Config::load(cli.config.as_deref())?;
    let output = Output {
        json: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::View {
            fixture,
            account,
            domain,
            group,
            focus,
            focus_username,
        }) => {
            let focus = focus_arg(focus, focus_username);
            cmd_view(
                &config,
                output,
                &fixture,
                account.as_deref(),
                domain,
                group.as_deref(),
                focus.as_ref(),
            )
            .await
        }
        Some(Commands::Simulate {
            fixture,
            account,
            domain,
            group,
            focus,
            focus_username,
            delay_ms,
        }) => {
            let focus = focus_arg(focus, focus_username);
            cmd_simulate(
                &config,
                output,
                &fixture,
                account.as_deref(),
                domain,
                group.as_deref(),
                focus.as_ref(),
                delay_ms,
            )
            .await
        }
        Some(Commands::Server {
            fixture,
            account,
            host,
            port,
        }) => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            cmd_server(&config, &server, fixture.as_deref(), account.as_deref()).await
        }
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    }
}
