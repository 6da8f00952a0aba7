//! One-shot fast market buy.
//!
//! Emulates a market order with limit orders: on the first order book it
//! sees for its market, bids well above the lowest ask so the order crosses
//! the book immediately, sized so the fee still fits in the budget. After a
//! short delay it places the profit-taking sell and is done. Meant for
//! single-trade observers, which follow the market and quantity carried by
//! each decision.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trading_core::precision::significant;
use trading_core::{
    error::StrategyError, traits::StrategyConfig, Decision, Observation, Strategy, StrategyState,
};

/// Configuration for the fast buy strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastBuyConfig {
    /// Market to buy; the first market observed when unset
    pub market: Option<String>,
    /// Minor currency committed to the buy
    pub balance_to_spend: Decimal,
    /// Exchange fee fraction
    pub fee: Decimal,
    /// Multiplier over the lowest ask that caps the buy price
    pub max_price_dif: Decimal,
    /// Multiplier over the average entry price for the sell
    pub target_profit: Decimal,
    /// Minimum time between the buy and the sell
    pub sell_delay_secs: u64,
}

impl Default for FastBuyConfig {
    fn default() -> Self {
        Self {
            market: None,
            balance_to_spend: dec!(100),
            fee: dec!(0.002),
            max_price_dif: dec!(1.35),
            target_profit: dec!(1.5),
            sell_delay_secs: 5,
        }
    }
}

impl StrategyConfig for FastBuyConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.balance_to_spend <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Balance to spend must be positive".into(),
            ));
        }
        if self.fee < Decimal::ZERO || self.fee >= Decimal::ONE {
            return Err(StrategyError::InvalidConfig(
                "Fee must be in [0, 1)".into(),
            ));
        }
        if self.max_price_dif < Decimal::ONE {
            return Err(StrategyError::InvalidConfig(
                "Max price difference must be at least 1".into(),
            ));
        }
        if self.target_profit <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Target profit must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Waiting,
    Bought {
        market: String,
        lowest_ask: Decimal,
        target_ask: Decimal,
        at: DateTime<Utc>,
    },
    Done,
}

/// Buys once at a capped price, then sells once at the profit target.
pub struct FastBuyStrategy {
    config: FastBuyConfig,
    post_fee: Decimal,
    phase: Phase,
    observations_processed: usize,
    decisions_emitted: usize,
}

impl FastBuyStrategy {
    pub fn new(config: FastBuyConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            post_fee: Decimal::ONE - config.fee,
            config,
            phase: Phase::Waiting,
            observations_processed: 0,
            decisions_emitted: 0,
        })
    }

    /// Whether both legs have been emitted.
    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    fn buy(&mut self, market: &str, lowest_ask: Decimal, at: DateTime<Utc>) -> Option<Decision> {
        if lowest_ask <= Decimal::ZERO {
            return None;
        }
        let target_ask = significant(lowest_ask * self.config.max_price_dif);
        let amount = significant(self.config.balance_to_spend / target_ask * self.post_fee);
        info!(%market, %lowest_ask, %target_ask, %amount, "Fast buy");

        self.phase = Phase::Bought {
            market: market.to_string(),
            lowest_ask,
            target_ask,
            at,
        };
        Some(Decision::buy(target_ask).for_market(market).with_quantity(amount))
    }
}

impl Strategy for FastBuyStrategy {
    fn name(&self) -> &str {
        "Fast Market Buy"
    }

    fn description(&self) -> &str {
        "Buys one market once at a capped price, then sells at a profit target"
    }

    fn on_observation(&mut self, observation: &Observation) -> Option<Decision> {
        let decision = match &self.phase {
            Phase::Done => return None,
            Phase::Waiting => {
                if self
                    .config
                    .market
                    .as_deref()
                    .is_some_and(|market| market != observation.market)
                {
                    return None;
                }
                let Some((_, ask)) = observation.quote.book() else {
                    debug!(market = %observation.market, "Fast buy needs an order book quote");
                    return None;
                };
                self.observations_processed += 1;
                self.buy(&observation.market, ask, observation.timestamp)?
            }
            Phase::Bought {
                market,
                lowest_ask,
                target_ask,
                at,
            } => {
                if *market != observation.market {
                    return None;
                }
                self.observations_processed += 1;
                let delay = Duration::seconds(self.config.sell_delay_secs as i64);
                if observation.timestamp < *at + delay {
                    return None;
                }
                let price =
                    significant((*lowest_ask + *target_ask) / Decimal::TWO * self.config.target_profit);
                info!(%market, %price, "Placing profit-taking sell");
                let decision = Decision::sell(price).for_market(market.as_str());
                self.phase = Phase::Done;
                decision
            }
        };
        self.decisions_emitted += 1;
        Some(decision)
    }

    fn reset(&mut self) {
        self.phase = Phase::Waiting;
        self.observations_processed = 0;
        self.decisions_emitted = 0;
    }

    fn state(&self) -> StrategyState {
        let phase = match &self.phase {
            Phase::Waiting => "waiting",
            Phase::Bought { .. } => "bought",
            Phase::Done => "done",
        };
        StrategyState {
            name: self.name().to_string(),
            observations_processed: self.observations_processed,
            decisions_emitted: self.decisions_emitted,
            custom: serde_json::json!({
                "phase": phase,
                "market": self.config.market,
            }),
            ..Default::default()
        }
    }
}
