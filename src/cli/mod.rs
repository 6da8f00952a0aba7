//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cryptotrader")]
#[command(author, version, about = "Crypto trading bot with simulated order fills")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level, overriding the configuration file
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline, strategy and simulated traders until Ctrl-C
    Run(RunArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
    /// Check whether the current spread clears the minimum return
    Profitability(ProfitabilityArgs),
    /// Print a default configuration file
    ConfigTemplate,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Strategy to run, overriding the configuration file
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Market to trade, overriding the configuration file
    #[arg(short, long)]
    pub market: Option<String>,

    /// Number of traders to split the funds across
    #[arg(short, long)]
    pub traders: Option<usize>,

    /// Trade once on the market and quantity each decision names
    #[arg(long)]
    pub single_trade: bool,
}

#[derive(clap::Args)]
pub struct ProfitabilityArgs {
    /// Market to check, overriding the configuration file
    #[arg(short, long)]
    pub market: Option<String>,

    /// Required round-trip return, e.g. 1.005
    #[arg(long)]
    pub minimum_return: Option<rust_decimal::Decimal>,
}
