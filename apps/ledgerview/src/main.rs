//! # Ledgerview
//!
//! Command-line front end for live ledger views.
//!
//! ## Usage
//!
//! ```bash
//! # Build a view once from a fixture
//! ledgerview view -f fixtures/demo.json -d friends
//!
//! # Replay a fixture against an active live view
//! ledgerview simulate -f fixtures/demo.json -d groups
//!
//! # Follow one session, re-reading it on a timer
//! ledgerview simulate -f fixtures/demo.json -d sessions --focus 1
//!
//! # Serve the account's views over HTTP
//! ledgerview server -f fixtures/demo.json --port 8080
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // LEDGERVIEW_LOG_FORMAT=json switches to machine-parseable output.
    let log_format =
        std::env::var("LEDGERVIEW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledgerview=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ledgerview v{}
  live views over an append-only ledger
"#,
        env!("CARGO_PKG_VERSION")
    );
}
