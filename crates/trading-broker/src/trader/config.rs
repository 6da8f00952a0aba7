//! Trader configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use trading_core::{DefaultPosition, LimitOrder, Side, TradingError, TradingResult};

/// Per-exchange trading parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    /// Fee fraction charged on each fill
    pub fee: Decimal,
    /// Smallest order quantity the exchange accepts, in the major currency
    pub minimum_trade: Decimal,
    /// Decimal places accepted for order quantities
    pub amount_decimals: u32,
    /// Decimal places accepted for limit prices
    pub price_decimals: u32,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            fee: dec!(0.0025),
            minimum_trade: dec!(0.01),
            amount_decimals: 8,
            price_decimals: 8,
        }
    }
}

/// Sentinel order whose cancellation stops the trader.
///
/// Placed far from the market so it never fills. An operator cancels it on
/// the exchange to make every trader watching it abort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitch {
    pub market: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl KillSwitch {
    pub fn order(&self) -> LimitOrder {
        LimitOrder::new(&self.market, self.side, self.quantity, self.price)
    }
}

/// Configuration for a single [`Trader`](super::Trader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Market orders are placed on
    pub market: String,
    /// Currency being bought and sold
    pub major_currency: String,
    /// Currency prices are quoted in
    pub minor_currency: String,
    pub exchange: ExchangeOptions,
    /// Share of the live account this trader may use, in `(0, 1]`
    pub percentage_to_trade: Decimal,
    /// Start holding the minor currency (ready to buy)
    pub start_by_buying: bool,
    /// Simulated starting funds, on the side chosen by `start_by_buying`
    pub starting_amount: Decimal,
    pub default_position: DefaultPosition,
    /// Cross the spread when reverting to the default position
    pub aggressive: bool,
    pub kill_switch: Option<KillSwitch>,
}

impl TraderConfig {
    /// Create a config with default trading parameters for one market.
    pub fn new(
        market: impl Into<String>,
        major_currency: impl Into<String>,
        minor_currency: impl Into<String>,
    ) -> Self {
        Self {
            market: market.into(),
            major_currency: major_currency.into(),
            minor_currency: minor_currency.into(),
            exchange: ExchangeOptions::default(),
            percentage_to_trade: Decimal::ONE,
            start_by_buying: true,
            starting_amount: dec!(100),
            default_position: DefaultPosition::Hold,
            aggressive: false,
            kill_switch: None,
        }
    }

    pub fn validate(&self) -> TradingResult<()> {
        if self.market.is_empty() {
            return Err(TradingError::Config("Market must not be empty".into()));
        }
        if self.exchange.fee < Decimal::ZERO || self.exchange.fee >= Decimal::ONE {
            return Err(TradingError::Config(format!(
                "Fee must be in [0, 1), got {}",
                self.exchange.fee
            )));
        }
        if self.exchange.minimum_trade < Decimal::ZERO {
            return Err(TradingError::Config(
                "Minimum trade must not be negative".into(),
            ));
        }
        if self.percentage_to_trade <= Decimal::ZERO || self.percentage_to_trade > Decimal::ONE {
            return Err(TradingError::Config(format!(
                "Percentage to trade must be in (0, 1], got {}",
                self.percentage_to_trade
            )));
        }
        if self.starting_amount < Decimal::ZERO {
            return Err(TradingError::Config(
                "Starting amount must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Divide this trader's share into `n` equal traders.
    pub fn split(&self, n: usize) -> TradingResult<Vec<TraderConfig>> {
        if n == 0 {
            return Err(TradingError::Config(
                "Cannot split a trader into zero parts".into(),
            ));
        }
        let parts = Decimal::from(n);
        Ok((0..n)
            .map(|_| TraderConfig {
                percentage_to_trade: self.percentage_to_trade / parts,
                starting_amount: self.starting_amount / parts,
                ..self.clone()
            })
            .collect())
    }
}
