//! Command-line front end: feeds documents through the pipeline and reads
//! the ledger back.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{process, report};

/// Extract, validate and reconcile business documents into contract chains
#[derive(Parser)]
#[command(name = "docchain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process documents and save them to the ledger
    Process(process::ProcessArgs),

    /// List counterparties with their document totals
    Counterparties(report::CounterpartiesArgs),

    /// List chains that still have an outstanding balance
    Chains(report::OutputArgs),

    /// Show one chain and its documents
    Chain(report::ChainArgs),

    /// Show ledger totals
    Stats(report::OutputArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load(cli.config.as_deref())?;
    docchain::telemetry::init_tracing(&config.logging.level, config.logging.format)?;

    match cli.command {
        Commands::Process(args) => process::run(args, &config).await,
        Commands::Counterparties(args) => report::counterparties(args, &config),
        Commands::Chains(args) => report::chains(args, &config),
        Commands::Chain(args) => report::chain(args, &config),
        Commands::Stats(args) => report::stats(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["docchain", "chain", "Д-2024-001", "--config", "docchain.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("docchain.json")));
        assert!(matches!(cli.command, Commands::Chain(_)));
    }

    #[test]
    fn test_process_requires_files() {
        assert!(Cli::try_parse_from(["docchain", "process"]).is_err());
    }
}
