//! Decision observers.

use rust_decimal::Decimal;
use tracing::debug;
use trading_broker::Trader;
use trading_core::precision::significant;
use trading_core::{Action, Decision, TradingResult};

/// Turns decisions into trader calls.
pub enum Observer {
    /// Buys, sells or holds on the trader's own market.
    Standard(Trader),
    /// Follows a strategy that picks the market and size per decision.
    ///
    /// The trader is moved to the decision's market and trades exactly the
    /// requested quantity once; a sell ends its life.
    SingleTrade(Trader),
}

impl Observer {
    pub fn trader(&self) -> &Trader {
        match self {
            Observer::Standard(trader) | Observer::SingleTrade(trader) => trader,
        }
    }

    pub fn trader_mut(&mut self) -> &mut Trader {
        match self {
            Observer::Standard(trader) | Observer::SingleTrade(trader) => trader,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Observer::Standard(_) => "standard",
            Observer::SingleTrade(_) => "single_trade",
        }
    }

    /// Act on one decision.
    pub async fn notify(&mut self, decision: &Decision) -> TradingResult<()> {
        match self {
            Observer::Standard(trader) => match decision.action {
                Action::Buy => trader.buy(decision.price).await,
                Action::Sell => trader.sell(decision.price).await,
                Action::Hold => hold(trader, decision).await,
            },
            Observer::SingleTrade(trader) => match decision.action {
                Action::Buy => {
                    if let Some(market) = &decision.market {
                        trader.set_market(market.as_str())?;
                    }
                    trader.clear_assets();
                    if let Some(quantity) = decision.quantity.filter(|q| *q >= Decimal::ZERO) {
                        trader.override_balance(significant(quantity * decision.price));
                    }
                    trader.buy(decision.price).await
                }
                Action::Sell => {
                    if let Some(market) = &decision.market {
                        trader.set_market(market.as_str())?;
                    }
                    trader.sell(decision.price).await?;
                    trader.abort();
                    Ok(())
                }
                Action::Hold => hold(trader, decision).await,
            },
        }
    }
}

/// Hold, first adopting the decision's default-position bias.
async fn hold(trader: &mut Trader, decision: &Decision) -> TradingResult<()> {
    if let Some(bias) = decision.bias {
        if bias != trader.config().default_position {
            debug!(market = trader.market(), %bias, "Adopting default position from decision");
            let aggressive = trader.config().aggressive;
            trader.should_default_to(bias, aggressive);
        }
    }
    trader.hold(decision.price).await
}
