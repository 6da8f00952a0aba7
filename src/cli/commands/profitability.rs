//! Spread profitability check.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use trading_broker::HttpExchange;
use trading_config::load_config;
use trading_core::{MarketFeed, MarketSnapshot};
use trading_indicators::SpreadSize;
use trading_strategies::SpreadConfig;

use crate::cli::ProfitabilityArgs;

pub async fn run(args: ProfitabilityArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let market = args.market.unwrap_or_else(|| config.exchange.market.clone());

    let minimum_return = match args.minimum_return {
        Some(value) => value,
        None => serde_json::from_value::<SpreadConfig>(config.strategy_params())
            .map(|spread| spread.minimum_return)
            .unwrap_or_else(|_| SpreadConfig::default().minimum_return),
    };
    let spread = SpreadSize::new(minimum_return, config.exchange.fee)?;

    let exchange = HttpExchange::new(&config.exchange.name, config.exchange.http.clone())?;
    let MarketSnapshot::Available(quote) = exchange.fetch_snapshot(&market).await? else {
        bail!("{market} is not listed on {}", config.exchange.name);
    };
    let Some((bid, ask)) = quote.quote.book() else {
        bail!("{} returned no order book for {market}", config.exchange.name);
    };

    let undercut = config.exchange.undercut;
    let our_bid = bid + undercut;
    let our_ask = ask - undercut;
    let expected = spread.expected_return(our_bid, our_ask);

    println!("Market:          {market}");
    println!("Best bid / ask:  {bid} / {ask}");
    println!("Our bid / ask:   {our_bid} / {our_ask}");
    println!("Fee per leg:     {}", config.exchange.fee);
    match expected {
        Some(value) => println!("Expected return: {}", value.round_dp(6)),
        None => println!("Expected return: n/a"),
    }
    println!("Minimum return:  {minimum_return}");
    if spread.is_profitable(our_bid, our_ask) {
        println!("The spread is profitable.");
    } else {
        let gap = expected.map_or(Decimal::ZERO, |e| minimum_return - e);
        println!("The spread is not profitable ({} short).", gap.round_dp(6));
    }
    Ok(())
}
