//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use trading_config::load_config;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    };
    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!(
        "Exchange: {} ({}, {}/{})",
        config.exchange.name,
        config.exchange.market,
        config.exchange.major_currency,
        config.exchange.minor_currency
    );
    println!("Fee: {}", config.exchange.fee);
    println!("Minimum trade: {}", config.exchange.minimum_trade);
    println!("Pipeline: {:?}", config.pipeline.mode);
    println!("Strategy: {} {}", config.strategy.name, config.strategy_params());
    println!(
        "Traders: {} x {} (default position {}, aggressive {})",
        config.trader.traders,
        config.trader.percentage_to_trade / rust_decimal::Decimal::from(config.trader.traders),
        config.trader.default_position,
        config.trader.aggressive
    );

    Ok(())
}
