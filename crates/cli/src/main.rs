//! bankrecon CLI - Main Entry Point
//!
//! Runs the banking portal checks, captures web data and reconciles it
//! against the REST API.

use std::path::PathBuf;

use bankrecon_cli::args::{GlobalArgs, TransferArgs};
use bankrecon_cli::commands::{config, pipeline, validate, web};
use clap::{Parser, Subcommand};

/// bankrecon - Banking portal checks with API vs web reconciliation
#[derive(Parser)]
#[command(name = "bankrecon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Part 1: valid and invalid login checks
    Login,

    /// Part 2: account balances and transaction history
    Accounts,

    /// Part 3: date-filtered transactions and high-value credits
    Transactions,

    /// Part 4: funds transfer with before/after balance verification
    Transfer {
        #[command(flatten)]
        args: TransferArgs,
    },

    /// Part 6: reconcile API data against captured web sheets
    Validate {
        /// Workbook directory holding the web sheets (defaults to --output)
        #[arg(long)]
        web_data: Option<PathBuf>,
    },

    /// Parts 1-3 (optionally 4), then part 6
    Run {
        /// Also run the funds transfer, before the capture
        #[arg(long)]
        transfer: bool,
    },

    /// Print the effective settings
    Config {
        /// Write them to the --config file
        #[arg(long)]
        save: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.global.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Login => web::login(&cli.global).await?,
        Commands::Accounts => web::accounts(&cli.global).await?,
        Commands::Transactions => web::transactions(&cli.global).await?,
        Commands::Transfer { args } => web::transfer(&cli.global, &args).await?,
        Commands::Validate { web_data } => {
            validate::execute(&cli.global, web_data.as_deref()).await?
        }
        Commands::Run { transfer } => pipeline::execute(&cli.global, transfer).await?,
        Commands::Config { save } => config::execute(&cli.global, save)?,
        Commands::Version => {
            println!("bankrecon v{}", bankrecon_common::VERSION);
        }
    }

    Ok(())
}
