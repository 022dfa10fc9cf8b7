//! Command-line interface.

mod check;
mod provision;
mod run;

use clap::{Parser, Subcommand};

use crate::error::Result;

/// An automated market maker for binary-outcome prediction markets.
#[derive(Debug, Parser)]
#[command(name = "bidsmith", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the market maker (default).
    Run,
    /// Validate configuration and connectivity without trading.
    Check,
    /// Create the worksheet templates in the configured spreadsheet.
    Provision,
}

/// Dispatch the parsed command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run::execute().await,
        Command::Check => check::execute().await,
        Command::Provision => provision::execute().await,
    }
}
