//! stomp: emergency-report client CLI.
//!
//! Reads `login`, `join`, `exit`, `report`, `summary` and `logout` command
//! lines from stdin and prints the outcome of each, together with anything
//! the broker sends in between.

mod config;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use stomp_client::{Session, TcpConnector};
use tokio::io::BufReader;
use tracing::{error, warn};

/// stomp: emergency-report client
#[derive(Parser)]
#[command(name = "stomp", version = "0.1.0", about = "Emergency-report client for a STOMP broker")]
struct Cli {
    /// Config file path
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr, notices to stdout.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("stomp=debug,stomp_cli=debug,stomp_client=debug,stomp_core=debug")
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("stomp: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_path);
    let cfg = config::Config::load(&config_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        config::Config::default()
    });

    let mut session = Session::new(Arc::new(TcpConnector), cfg.session.to_session_config());
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    repl::run(&mut session, stdin, &mut stdout).await
}
