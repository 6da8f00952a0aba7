//! Crypto trading bot CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use trading_config::load_config;
use trading_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging comes from the config file when it loads; flags win
    let logging = load_config(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    let level = cli
        .log_level
        .map(cli::LogLevel::as_str)
        .unwrap_or(logging.level.as_str());
    let json = cli.json_logs || logging.format == "json";
    let _guard = setup_logging(level, json, logging.file.as_deref().map(Path::new));

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &cli.config).await,
        Commands::Strategies => cli::commands::strategies::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
        Commands::Profitability(args) => {
            cli::commands::profitability::run(args, &cli.config).await
        }
        Commands::ConfigTemplate => cli::commands::template::run().await,
    }
}
